// ABOUTME: Text recognition: the OcrEngine seam and the shared, once-initialized Recognizer around it.
// ABOUTME: The Recognizer serializes engine calls and turns fragments into one string per image.

//! Optical text recognition.
//!
//! Components:
//! - [`OcrEngine`] - the engine seam: raster in, ordered text fragments out
//! - [`Recognizer`] - owns one engine for the life of the process
//! - [`HttpOcrEngine`] - engine backed by an OCR sidecar service
//!
//! Engines are expensive to construct (model loading, language data) and are
//! generally not safe for uncoordinated concurrent use. Build one
//! `Recognizer` at start-up, share it behind an `Arc`, and let it hand the
//! engine to one caller at a time.

pub mod http;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::acquire::RasterImage;
use crate::error::PipelineError;

pub use http::HttpOcrEngine;

/// Languages recognized when none are configured: Hungarian and English.
pub const DEFAULT_LANGUAGES: &[&str] = &["hu", "en"];

/// One piece of text detected in an image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// Confidence score (0.0-1.0), when the engine reports one.
    pub confidence: Option<f32>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// A text recognition engine.
///
/// Fragments are returned in the engine's own detection order. That order is
/// implementation-defined: callers may rely on it being stable for the same
/// image, not on any spatial layout.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Languages the engine was initialized with.
    fn languages(&self) -> &[String];

    /// Detects and recognizes all text regions in `image`.
    async fn detect(&self, image: &RasterImage) -> anyhow::Result<Vec<TextFragment>>;
}

/// Checks a recognition language list: non-empty, each a 2-3 letter lowercase code.
pub fn validate_languages<S: AsRef<str>>(languages: &[S]) -> Result<(), PipelineError> {
    if languages.is_empty() {
        return Err(PipelineError::config(
            "Languages",
            anyhow::anyhow!("at least one recognition language is required"),
        ));
    }
    for lang in languages {
        let lang = lang.as_ref();
        let well_formed =
            (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_lowercase());
        if !well_formed {
            return Err(PipelineError::config(
                "Languages",
                anyhow::anyhow!("invalid language code '{}'", lang),
            ));
        }
    }
    Ok(())
}

/// Long-lived wrapper around a single OCR engine.
pub struct Recognizer {
    engine: Mutex<Box<dyn OcrEngine>>,
    languages: Vec<String>,
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("languages", &self.languages)
            .finish_non_exhaustive()
    }
}

impl Recognizer {
    /// Wraps an initialized engine after validating its language set.
    pub fn new(engine: impl OcrEngine + 'static) -> Result<Self, PipelineError> {
        let languages = engine.languages().to_vec();
        validate_languages(&languages)?;
        info!(languages = ?languages, "recognizer ready");
        Ok(Self {
            engine: Mutex::new(Box::new(engine)),
            languages,
        })
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Recognizes one image, joining its fragments with single spaces.
    ///
    /// `label` identifies the image in errors and logs (usually its URL).
    pub async fn recognize_one(
        &self,
        label: &str,
        image: &RasterImage,
    ) -> Result<String, PipelineError> {
        let engine = self.engine.lock().await;
        let detected = engine.detect(image).await;
        drop(engine);
        let fragments =
            detected.map_err(|e| PipelineError::recognition(label, "Recognize", Some(e)))?;

        let text = join_fragments(&fragments);
        debug!(image = label, fragments = fragments.len(), "recognized");
        Ok(text)
    }

    /// Recognizes each image in order; one result per input.
    pub async fn recognize(&self, images: &[RasterImage]) -> Vec<Result<String, PipelineError>> {
        let mut out = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let result = self.recognize_one(&format!("image #{}", i), image).await;
            if let Err(ref err) = result {
                warn!(error = %err, "recognition failed");
            }
            out.push(result);
        }
        out
    }
}

fn join_fragments(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Engine reporting the first pixel's red value as text; fails on 0.
    struct ShadeEngine {
        languages: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OcrEngine for ShadeEngine {
        fn languages(&self) -> &[String] {
            &self.languages
        }

        async fn detect(&self, image: &RasterImage) -> anyhow::Result<Vec<TextFragment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let shade = image.pixels()[[0, 0, 0]];
            if shade == 0 {
                anyhow::bail!("engine crashed");
            }
            Ok(vec![
                TextFragment::new(format!("shade{}", shade)),
                TextFragment::new("  "),
                TextFragment::new(" end "),
            ])
        }
    }

    fn raster(shade: u8) -> RasterImage {
        RasterImage::from_rgb(1, 1, vec![shade, shade, shade]).unwrap()
    }

    fn engine(calls: Arc<AtomicUsize>) -> ShadeEngine {
        ShadeEngine {
            languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            calls,
        }
    }

    #[test]
    fn language_validation() {
        assert!(validate_languages(DEFAULT_LANGUAGES).is_ok());
        assert!(validate_languages(&["hun"]).is_ok());
        assert!(validate_languages::<&str>(&[]).is_err());
        assert!(validate_languages(&["HU"]).is_err());
        assert!(validate_languages(&["english"]).is_err());
    }

    #[test]
    fn recognizer_rejects_engine_without_languages() {
        let mut e = engine(Arc::new(AtomicUsize::new(0)));
        e.languages.clear();
        let err = Recognizer::new(e).expect_err("no languages");
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn one_result_per_image_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recognizer = Recognizer::new(engine(calls.clone())).unwrap();

        let results = recognizer.recognize(&[raster(7), raster(0), raster(9)]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref().unwrap(), "shade7 end");
        assert!(results[1].as_ref().unwrap_err().is_recognition());
        assert_eq!(results[2].as_deref().unwrap(), "shade9 end");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn repeated_calls_are_stable() {
        let recognizer = Recognizer::new(engine(Arc::new(AtomicUsize::new(0)))).unwrap();
        let first = recognizer.recognize_one("x", &raster(3)).await.unwrap();
        let second = recognizer.recognize_one("x", &raster(3)).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn join_skips_blank_fragments() {
        let fragments = vec![TextFragment::new(""), TextFragment::new("a"), TextFragment::new("b")];
        assert_eq!(join_fragments(&fragments), "a b");
        assert_eq!(join_fragments(&[]), "");
    }
}
