// ABOUTME: Error types for the folio pipeline: the ErrorCode taxonomy and the PipelineError struct.
// ABOUTME: Provides per-code constructors plus helpers for grouping (network) and retry decisions.

use std::fmt;

/// Error codes representing the categories of pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Network,
    Timeout,
    HttpStatus(u16),
    Extract,
    ImageDecode,
    Recognition,
    Config,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidUrl => write!(f, "invalid URL"),
            ErrorCode::Network => write!(f, "network error"),
            ErrorCode::Timeout => write!(f, "timeout"),
            ErrorCode::HttpStatus(status) => write!(f, "HTTP status {}", status),
            ErrorCode::Extract => write!(f, "extraction error"),
            ErrorCode::ImageDecode => write!(f, "image decode error"),
            ErrorCode::Recognition => write!(f, "recognition error"),
            ErrorCode::Config => write!(f, "configuration error"),
        }
    }
}

/// The error type shared by every pipeline stage.
///
/// `url` is the page or image the failure belongs to and `op` names the
/// stage that produced it ("Fetch", "Extract", "Decode", ...).
#[derive(Debug, thiserror::Error)]
pub struct PipelineError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "folio: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl PipelineError {
    /// Create an error with an explicit code.
    pub fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Network error (connection failure, unreadable body, oversize body).
    pub fn network(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Network, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Timeout, url, op, source)
    }

    /// Create an error for a non-success HTTP status.
    pub fn http_status(url: impl Into<String>, op: impl Into<String>, status: u16) -> Self {
        Self::new(ErrorCode::HttpStatus(status), url, op, None)
    }

    /// Create an Extract error.
    pub fn extract(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Extract, url, op, source)
    }

    /// Create an ImageDecode error.
    pub fn image_decode(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::ImageDecode, url, op, source)
    }

    /// Create a Recognition error.
    pub fn recognition(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Recognition, url, op, source)
    }

    /// Create a Config error. Configuration errors have no URL.
    pub fn config(op: impl Into<String>, source: anyhow::Error) -> Self {
        Self::new(ErrorCode::Config, String::new(), op, Some(source))
    }

    /// Returns true for every kind of fetch failure: bad URL, transport,
    /// timeout or non-success status.
    pub fn is_network(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidUrl | ErrorCode::Network | ErrorCode::Timeout | ErrorCode::HttpStatus(_)
        )
    }

    /// Returns true if the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ErrorCode::Network | ErrorCode::Timeout => true,
            ErrorCode::HttpStatus(status) => status == 429 || status >= 500,
            _ => false,
        }
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an Extract error.
    pub fn is_extract(&self) -> bool {
        self.code == ErrorCode::Extract
    }

    /// Returns true if this is an ImageDecode error.
    pub fn is_image_decode(&self) -> bool {
        self.code == ErrorCode::ImageDecode
    }

    /// Returns true if this is a Recognition error.
    pub fn is_recognition(&self) -> bool {
        self.code == ErrorCode::Recognition
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        self.code == ErrorCode::Config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_url_code_and_source() {
        let err = PipelineError::network(
            "https://example.com/a",
            "Fetch",
            Some(anyhow::anyhow!("connection refused")),
        );
        assert_eq!(
            err.to_string(),
            "folio: Fetch https://example.com/a: network error: connection refused"
        );
    }

    #[test]
    fn http_status_display() {
        let err = PipelineError::http_status("https://example.com", "Fetch", 503);
        assert_eq!(err.to_string(), "folio: Fetch https://example.com: HTTP status 503");
    }

    #[test]
    fn network_grouping() {
        assert!(PipelineError::invalid_url("", "Fetch", None).is_network());
        assert!(PipelineError::timeout("u", "Fetch", None).is_network());
        assert!(PipelineError::http_status("u", "Fetch", 404).is_network());
        assert!(!PipelineError::extract("u", "Extract", None).is_network());
        assert!(!PipelineError::image_decode("u", "Decode", None).is_network());
    }

    #[test]
    fn retryable_only_for_transient_failures() {
        assert!(PipelineError::network("u", "Fetch", None).is_retryable());
        assert!(PipelineError::timeout("u", "Fetch", None).is_retryable());
        assert!(PipelineError::http_status("u", "Fetch", 500).is_retryable());
        assert!(PipelineError::http_status("u", "Fetch", 429).is_retryable());
        assert!(!PipelineError::http_status("u", "Fetch", 404).is_retryable());
        assert!(!PipelineError::invalid_url("u", "Fetch", None).is_retryable());
        assert!(!PipelineError::recognition("u", "Recognize", None).is_retryable());
    }
}
