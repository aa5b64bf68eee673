// ABOUTME: Per-document results: Document, its DocumentState machine, DocumentFailure and DocumentReport.
// ABOUTME: DocumentReport is the serializable, raster-free view used for JSON output.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::acquire::RasterImage;
use crate::error::PipelineError;
use crate::profiles::SourceTag;

/// Where a document is in the pipeline.
///
/// Happy path: `Fetched -> Extracted -> ImagesAcquired -> Recognized -> Assembled`.
/// `FetchFailed` and `ExtractionFailed` are terminal failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Fetched,
    Extracted,
    ImagesAcquired,
    Recognized,
    Assembled,
    FetchFailed,
    ExtractionFailed,
}

impl DocumentState {
    /// The state that follows this one on success.
    pub fn next(self) -> Option<DocumentState> {
        match self {
            DocumentState::Fetched => Some(DocumentState::Extracted),
            DocumentState::Extracted => Some(DocumentState::ImagesAcquired),
            DocumentState::ImagesAcquired => Some(DocumentState::Recognized),
            DocumentState::Recognized => Some(DocumentState::Assembled),
            _ => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            DocumentState::FetchFailed | DocumentState::ExtractionFailed
        )
    }

    pub fn is_terminal(self) -> bool {
        self.is_failed() || self == DocumentState::Assembled
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentState::Fetched => "fetched",
            DocumentState::Extracted => "extracted",
            DocumentState::ImagesAcquired => "images acquired",
            DocumentState::Recognized => "recognized",
            DocumentState::Assembled => "assembled",
            DocumentState::FetchFailed => "fetch failed",
            DocumentState::ExtractionFailed => "extraction failed",
        };
        f.write_str(s)
    }
}

/// One article as it moves through the pipeline.
///
/// `images[i]`, `image_indices[i]` and `ocr_texts[i]` describe the same image;
/// `image_indices[i]` points into `image_urls`, which keeps every accepted URL
/// including those whose download, decode or recognition failed.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub source_tag: SourceTag,
    pub main_text: Option<String>,
    pub image_urls: Vec<String>,
    pub images: Vec<RasterImage>,
    pub image_indices: Vec<usize>,
    pub ocr_texts: Vec<String>,
    pub state: DocumentState,
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    /// A freshly fetched document with nothing extracted yet.
    pub fn fetched(url: impl Into<String>, source_tag: SourceTag) -> Self {
        Self {
            url: url.into(),
            source_tag,
            main_text: None,
            image_urls: Vec::new(),
            images: Vec::new(),
            image_indices: Vec::new(),
            ocr_texts: Vec::new(),
            state: DocumentState::Fetched,
            fetched_at: Utc::now(),
        }
    }

    /// Moves to the next happy-path state.
    pub fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            tracing::debug!(url = %self.url, from = %self.state, to = %next, "document state");
            self.state = next;
        }
    }

    /// URL of the image each OCR text came from, aligned with `ocr_texts`.
    pub fn ocr_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.image_indices
            .iter()
            .zip(&self.ocr_texts)
            .filter_map(|(&i, text)| self.image_urls.get(i).map(|u| (u.as_str(), text.as_str())))
    }

    /// Article text followed by every non-blank OCR text, separated by blank lines.
    ///
    /// The pipeline keeps markup text and OCR text apart; this is the opt-in
    /// merge for consumers that want a single string.
    pub fn combined_text(&self) -> String {
        self.main_text
            .iter()
            .map(String::as_str)
            .chain(self.ocr_texts.iter().map(String::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A document that could not be processed.
#[derive(Debug, thiserror::Error)]
#[error("{state}: {error}")]
pub struct DocumentFailure {
    pub url: String,
    pub source_tag: SourceTag,
    pub state: DocumentState,
    #[source]
    pub error: PipelineError,
}

impl DocumentFailure {
    pub fn new(
        url: impl Into<String>,
        source_tag: SourceTag,
        state: DocumentState,
        error: PipelineError,
    ) -> Self {
        Self {
            url: url.into(),
            source_tag,
            state,
            error,
        }
    }
}

/// Outcome of processing one `(url, source_tag)` pair.
pub type DocumentResult = Result<Document, DocumentFailure>;

/// Serializable summary of a [`DocumentResult`], without raster data.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub url: String,
    pub source_tag: SourceTag,
    pub ok: bool,
    pub state: DocumentState,
    pub main_text: Option<String>,
    pub image_urls: Vec<String>,
    pub images_decoded: usize,
    pub ocr_texts: Vec<OcrText>,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One recognized image in a report.
#[derive(Debug, Clone, Serialize)]
pub struct OcrText {
    pub image_url: String,
    pub text: String,
}

impl From<&DocumentResult> for DocumentReport {
    fn from(result: &DocumentResult) -> Self {
        match result {
            Ok(doc) => DocumentReport {
                url: doc.url.clone(),
                source_tag: doc.source_tag,
                ok: true,
                state: doc.state,
                main_text: doc.main_text.clone(),
                image_urls: doc.image_urls.clone(),
                images_decoded: doc.images.len(),
                ocr_texts: doc
                    .ocr_sources()
                    .map(|(image_url, text)| OcrText {
                        image_url: image_url.to_string(),
                        text: text.to_string(),
                    })
                    .collect(),
                error: None,
                fetched_at: Some(doc.fetched_at),
            },
            Err(failure) => DocumentReport {
                url: failure.url.clone(),
                source_tag: failure.source_tag,
                ok: false,
                state: failure.state,
                main_text: None,
                image_urls: Vec::new(),
                images_decoded: 0,
                ocr_texts: Vec::new(),
                error: Some(failure.error.to_string()),
                fetched_at: None,
            },
        }
    }
}

impl DocumentReport {
    /// Plain-text rendering: a header line, the article text, then OCR texts.
    pub fn format_text(&self) -> String {
        let mut parts = vec![format!("== {} [{}] {}", self.url, self.source_tag, self.state)];
        if let Some(ref error) = self.error {
            parts.push(format!("error: {}", error));
        }
        if let Some(ref text) = self.main_text {
            parts.push(text.clone());
        }
        for ocr in &self.ocr_texts {
            parts.push(format!("[image {}]\n{}", ocr.image_url, ocr.text));
        }
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembled() -> Document {
        let mut doc = Document::fetched("https://example.com/a", SourceTag::Kriptoworld);
        doc.main_text = Some("Body text.".to_string());
        doc.image_urls = vec![
            "https://cdn/image-1.png".to_string(),
            "https://cdn/image-2.png".to_string(),
            "https://cdn/image-3.png".to_string(),
        ];
        doc.images = vec![
            RasterImage::from_rgb(1, 1, vec![0; 3]).unwrap(),
            RasterImage::from_rgb(1, 1, vec![0; 3]).unwrap(),
        ];
        doc.image_indices = vec![0, 2];
        doc.ocr_texts = vec!["first".to_string(), " ".to_string()];
        doc.state = DocumentState::Assembled;
        doc
    }

    #[test]
    fn happy_path_transitions() {
        let mut doc = Document::fetched("u", SourceTag::Default);
        let mut seen = vec![doc.state];
        while !doc.state.is_terminal() {
            doc.advance();
            seen.push(doc.state);
        }
        assert_eq!(
            seen,
            vec![
                DocumentState::Fetched,
                DocumentState::Extracted,
                DocumentState::ImagesAcquired,
                DocumentState::Recognized,
                DocumentState::Assembled,
            ]
        );
        assert!(!DocumentState::Assembled.is_failed());
        assert!(DocumentState::FetchFailed.is_terminal());
        assert_eq!(DocumentState::ExtractionFailed.next(), None);
    }

    #[test]
    fn ocr_sources_follow_indices() {
        let doc = assembled();
        let pairs: Vec<_> = doc.ocr_sources().collect();
        assert_eq!(
            pairs,
            vec![("https://cdn/image-1.png", "first"), ("https://cdn/image-3.png", " ")]
        );
    }

    #[test]
    fn combined_text_skips_blank_parts() {
        assert_eq!(assembled().combined_text(), "Body text.\n\nfirst");
    }

    #[test]
    fn report_for_failure() {
        let result: DocumentResult = Err(DocumentFailure::new(
            "https://example.com/b",
            SourceTag::Default,
            DocumentState::FetchFailed,
            PipelineError::http_status("https://example.com/b", "Fetch", 500),
        ));
        let report = DocumentReport::from(&result);
        assert!(!report.ok);
        assert_eq!(report.state, DocumentState::FetchFailed);
        assert!(report.error.unwrap().contains("HTTP status 500"));
    }

    #[test]
    fn report_serializes_without_rasters() {
        let result: DocumentResult = Ok(assembled());
        let value = serde_json::to_value(DocumentReport::from(&result)).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["state"], "assembled");
        assert_eq!(value["source_tag"], "kriptoworld");
        assert_eq!(value["images_decoded"], 2);
        assert_eq!(value["ocr_texts"][1]["image_url"], "https://cdn/image-3.png");
        assert!(value.get("images").is_none());
    }
}
