// ABOUTME: Fetcher for pages and images: the single point of contact with the network.
// ABOUTME: Applies the politeness delay, bounded retry with backoff, size limits and charset decoding.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::options::{Options, PolitenessDelay, RetryPolicy};

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, using the charset from the Content-Type header
    /// or, failing that, byte-level detection.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| part.trim().strip_prefix("charset=").map(str::to_string))
        .map(|charset| charset.trim_matches('"').trim_matches('\'').to_string())
}

/// HTTP fetcher shared by page and image downloads.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    headers: HashMap<String, String>,
    delay: PolitenessDelay,
    retry: RetryPolicy,
    max_content_length: usize,
}

impl Fetcher {
    /// Create a Fetcher from pipeline options, building an HTTP client unless
    /// one was supplied.
    pub fn new(opts: &Options) -> Result<Self, PipelineError> {
        let client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| PipelineError::config("Fetcher", anyhow::Error::new(e)))?,
        };

        Ok(Self {
            client,
            headers: opts.headers.clone(),
            delay: opts.delay,
            retry: opts.retry,
            max_content_length: opts.max_content_length,
        })
    }

    /// Override the body size limit (used for image downloads).
    pub fn with_max_content_length(mut self, limit: usize) -> Self {
        self.max_content_length = limit;
        self
    }

    /// Fetch the resource at `url`.
    ///
    /// Every attempt is preceded by the politeness delay. Transient failures
    /// (transport errors, timeouts, 5xx and 429) are retried up to
    /// `retry.max_retries` times with exponential backoff; everything else is
    /// returned immediately.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, PipelineError> {
        validate_url(url)?;

        let mut attempt = 0;
        loop {
            let pause = self.delay.sample(&mut rand::thread_rng());
            if !pause.is_zero() {
                debug!(url, ?pause, "politeness delay");
                tokio::time::sleep(pause).await;
            }

            match self.fetch_once(url).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(url, attempt, ?backoff, error = %err, "fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchResult, PipelineError> {
        let mut request = self.client.get(url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::http_status(url, "Fetch", status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_content_length {
                return Err(PipelineError::network(
                    url,
                    "Fetch",
                    Some(anyhow::anyhow!("content too large: {} bytes", len)),
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response.bytes().await.map_err(|e| transport_error(url, e))?;

        if body.len() > self.max_content_length {
            return Err(PipelineError::network(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large: {} bytes", body.len())),
            ));
        }

        Ok(FetchResult {
            status: status.as_u16(),
            url: url.to_string(),
            final_url,
            content_type,
            body,
        })
    }
}

fn validate_url(url: &str) -> Result<(), PipelineError> {
    if url.is_empty() {
        return Err(PipelineError::invalid_url(url, "Fetch", None));
    }

    let parsed = url::Url::parse(url).map_err(|e| {
        PipelineError::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(PipelineError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        )),
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::timeout(url, "Fetch", Some(anyhow::Error::new(err)))
    } else {
        PipelineError::network(url, "Fetch", Some(anyhow::Error::new(err)))
    }
}
