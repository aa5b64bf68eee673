// ABOUTME: OcrEngine backed by an OCR sidecar service over HTTP.
// ABOUTME: Posts a base64 PNG with the language set to {endpoint}/v1/ocr and reads back text regions.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::acquire::RasterImage;
use crate::error::PipelineError;
use crate::ocr::{validate_languages, OcrEngine, TextFragment};

#[derive(Serialize)]
struct OcrRequest<'a> {
    image: String,
    format: &'static str,
    languages: &'a [String],
}

#[derive(Deserialize)]
struct OcrRegion {
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    regions: Vec<OcrRegion>,
}

impl OcrResponse {
    /// Regions in service order; the whole-image text when no regions came back.
    fn into_fragments(self) -> Vec<TextFragment> {
        if self.regions.is_empty() {
            if self.text.trim().is_empty() {
                return Vec::new();
            }
            return vec![TextFragment::new(self.text)];
        }
        self.regions
            .into_iter()
            .map(|r| TextFragment {
                text: r.text,
                confidence: r.confidence,
            })
            .collect()
    }
}

/// Client for an OCR sidecar.
pub struct HttpOcrEngine {
    client: Client,
    endpoint: String,
    languages: Vec<String>,
}

impl HttpOcrEngine {
    /// Create an engine for the service at `endpoint` recognizing `languages`.
    pub fn new<S: AsRef<str>>(endpoint: &str, languages: &[S]) -> Result<Self, PipelineError> {
        validate_languages(languages)?;
        url::Url::parse(endpoint).map_err(|e| {
            PipelineError::config("HttpOcrEngine", anyhow::anyhow!("invalid endpoint: {}", e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PipelineError::config("HttpOcrEngine", anyhow::Error::new(e)))?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        let languages: Vec<String> = languages.iter().map(|l| l.as_ref().to_string()).collect();
        info!(endpoint = %endpoint, languages = ?languages, "OCR client configured");

        Ok(Self {
            client,
            endpoint,
            languages,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    fn languages(&self) -> &[String] {
        &self.languages
    }

    async fn detect(&self, image: &RasterImage) -> anyhow::Result<Vec<TextFragment>> {
        let start = std::time::Instant::now();
        let request = OcrRequest {
            image: STANDARD.encode(image.to_png()?),
            format: "png",
            languages: &self.languages,
        };

        let response: OcrResponse = self
            .client
            .post(format!("{}/v1/ocr", self.endpoint))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let fragments = response.into_fragments();
        debug!(
            fragments = fragments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR service responded"
        );
        Ok(fragments)
    }
}
