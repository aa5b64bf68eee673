// ABOUTME: Main library entry point for folio, the article text and image-OCR extraction pipeline.
// ABOUTME: Re-exports the public API: Pipeline, PipelineBuilder, Recognizer, SourceTag, Document and errors.

//! Folio - turns web articles into machine-readable text, including text
//! that is only present inside article images.
//!
//! For each `(url, source tag)` pair the pipeline fetches the page, extracts
//! the article body using the site family's [`SourceProfile`], downloads the
//! images that carry article content and runs them through a shared OCR
//! [`Recognizer`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use folio::{HttpOcrEngine, Pipeline, PipelineError, Recognizer, SourceTag, DEFAULT_LANGUAGES};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let engine = HttpOcrEngine::new("http://localhost:8080", DEFAULT_LANGUAGES)?;
//!     let recognizer = Arc::new(Recognizer::new(engine)?);
//!     let pipeline = Pipeline::builder().build(recognizer)?;
//!
//!     let results = pipeline
//!         .extract_batch(&[("https://kriptoworld.hu/some-article", SourceTag::Kriptoworld)])
//!         .await;
//!     for result in results.into_iter().flatten() {
//!         println!("{}", result.combined_text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod error;
pub mod extractors;
pub mod ocr;
pub mod options;
pub mod pipeline;
pub mod profiles;
pub mod resource;
pub mod result;

pub use crate::acquire::{AcquiredImage, ImageAcquirer, RasterImage};
pub use crate::error::{ErrorCode, PipelineError};
pub use crate::extractors::content::{extract, Extraction};
pub use crate::ocr::{HttpOcrEngine, OcrEngine, Recognizer, TextFragment, DEFAULT_LANGUAGES};
pub use crate::options::{Options, PipelineBuilder, PolitenessDelay, RetryPolicy};
pub use crate::pipeline::Pipeline;
pub use crate::profiles::{ImageFilter, SourceProfile, SourceTag};
pub use crate::resource::{FetchResult, Fetcher};
pub use crate::result::{
    Document, DocumentFailure, DocumentReport, DocumentResult, DocumentState, OcrText,
};
