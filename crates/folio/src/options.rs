// ABOUTME: Configuration for the folio pipeline: Options, PolitenessDelay, RetryPolicy and PipelineBuilder.
// ABOUTME: PipelineBuilder provides a fluent API for constructing a Pipeline around a shared Recognizer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::PipelineError;
use crate::ocr::Recognizer;
use crate::pipeline::Pipeline;

/// Maximum accepted page body (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Maximum accepted image payload (10 MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Randomized pause taken before every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    pub min: Duration,
    pub max: Duration,
}

impl PolitenessDelay {
    /// Create a delay drawn uniformly from `[min, max]`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Build a delay from bounds given in (fractional) seconds.
    pub fn from_secs_f64(min: f64, max: f64) -> Result<Self, PipelineError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
            return Err(PipelineError::config(
                "PolitenessDelay",
                anyhow::anyhow!("delay bounds must be finite and non-negative"),
            ));
        }
        let to_duration = |secs: f64| {
            Duration::try_from_secs_f64(secs).map_err(|e| {
                PipelineError::config(
                    "PolitenessDelay",
                    anyhow::anyhow!("delay bound {}s out of range: {}", secs, e),
                )
            })
        };
        let delay = Self::new(to_duration(min)?, to_duration(max)?);
        delay.validate()?;
        Ok(delay)
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min > self.max {
            return Err(PipelineError::config(
                "PolitenessDelay",
                anyhow::anyhow!(
                    "minimum delay {:?} exceeds maximum delay {:?}",
                    self.min,
                    self.max
                ),
            ));
        }
        Ok(())
    }

    /// Draw one delay from the configured interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for PolitenessDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(3000))
    }
}

/// Bounded retry with exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based): `backoff * 2^(attempt-1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration options for the pipeline.
#[derive(Debug, Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    pub delay: PolitenessDelay,
    pub retry: RetryPolicy,
    pub image_concurrency: usize,
    pub max_content_length: usize,
    pub max_image_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Folio/0.1".to_string(),
            http_client: None,
            headers: HashMap::new(),
            delay: PolitenessDelay::default(),
            retry: RetryPolicy::default(),
            image_concurrency: 1,
            max_content_length: MAX_CONTENT_LENGTH,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.delay.validate()?;
        if self.image_concurrency == 0 {
            return Err(PipelineError::config(
                "Options",
                anyhow::anyhow!("image_concurrency must be at least 1"),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing Pipeline instances with custom configuration.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    opts: Options,
}

impl PipelineBuilder {
    /// Create a new PipelineBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set the politeness delay bounds.
    pub fn delay(mut self, delay: PolitenessDelay) -> Self {
        self.opts.delay = delay;
        self
    }

    /// Set the retry policy for transient fetch failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.opts.retry = retry;
        self
    }

    /// Number of images downloaded and decoded at once within a document.
    pub fn image_concurrency(mut self, n: usize) -> Self {
        self.opts.image_concurrency = n;
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.opts.max_image_bytes = n;
        self
    }

    /// Build the Pipeline around an already-initialized Recognizer.
    pub fn build(self, recognizer: Arc<Recognizer>) -> Result<Pipeline, PipelineError> {
        Pipeline::new(self.opts, recognizer)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
