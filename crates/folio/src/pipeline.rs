// ABOUTME: Pipeline controller: runs fetch, extraction, image acquisition and recognition per document.
// ABOUTME: Document failures become DocumentFailure values; batches always return one result per input.

use std::sync::Arc;

use tracing::{info, warn};

use crate::acquire::ImageAcquirer;
use crate::error::PipelineError;
use crate::extractors::compiled::precompile_selectors;
use crate::extractors::content::extract;
use crate::ocr::Recognizer;
use crate::options::{Options, PipelineBuilder};
use crate::profiles::SourceTag;
use crate::resource::Fetcher;
use crate::result::{Document, DocumentFailure, DocumentResult, DocumentState};

/// Orchestrates the per-document stages.
///
/// Holds no per-document state between calls. The [`Recognizer`] is shared:
/// build it once and hand the same `Arc` to every pipeline.
pub struct Pipeline {
    fetcher: Fetcher,
    acquirer: ImageAcquirer,
    recognizer: Arc<Recognizer>,
}

impl Pipeline {
    /// Create a new PipelineBuilder for configuring the pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Create a Pipeline with the given options and recognizer.
    pub fn new(opts: Options, recognizer: Arc<Recognizer>) -> Result<Self, PipelineError> {
        opts.validate()?;
        precompile_selectors(SourceTag::ALL.iter().flat_map(|tag| tag.profile().selectors()));
        let fetcher = Fetcher::new(&opts)?;
        let acquirer = ImageAcquirer::new(
            fetcher.clone(),
            opts.image_concurrency,
            opts.max_image_bytes,
        );
        Ok(Self {
            fetcher,
            acquirer,
            recognizer,
        })
    }

    pub fn recognizer(&self) -> &Arc<Recognizer> {
        &self.recognizer
    }

    /// Processes one document.
    ///
    /// Fetch and extraction failures are logged and returned as a
    /// [`DocumentFailure`]; image-level failures only shorten `images` and
    /// `ocr_texts`.
    pub async fn extract_one(&self, url: &str, source_tag: SourceTag) -> DocumentResult {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(err) => {
                warn!(url, error = %err, "fetch failed, skipping document");
                return Err(DocumentFailure::new(
                    url,
                    source_tag,
                    DocumentState::FetchFailed,
                    err,
                ));
            }
        };

        let mut doc = Document::fetched(url, source_tag);
        let base_url = url::Url::parse(&page.final_url).ok();
        let extraction = extract(&page.text(), source_tag.profile(), base_url.as_ref());

        let (main_text, image_urls) = match extraction.require_text(url) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(url, source = %source_tag, error = %err, "no content located, skipping document");
                return Err(DocumentFailure::new(
                    url,
                    source_tag,
                    DocumentState::ExtractionFailed,
                    err,
                ));
            }
        };
        doc.main_text = Some(main_text);
        doc.image_urls = image_urls;
        doc.advance();

        let acquired = self.acquirer.acquire(&doc.image_urls).await;
        doc.advance();

        for image in acquired {
            match self.recognizer.recognize_one(&image.url, &image.raster).await {
                Ok(text) => {
                    doc.images.push(image.raster);
                    doc.image_indices.push(image.index);
                    doc.ocr_texts.push(text);
                }
                Err(err) => warn!(url, image = %image.url, error = %err, "dropping unrecognized image"),
            }
        }
        doc.advance();
        debug_assert_eq!(doc.images.len(), doc.ocr_texts.len());
        doc.advance();

        info!(
            url,
            source = %source_tag,
            candidates = doc.image_urls.len(),
            recognized = doc.ocr_texts.len(),
            "document assembled"
        );
        Ok(doc)
    }

    /// Processes documents one after another; a failure never stops the batch.
    ///
    /// The output has one entry per input, in input order.
    pub async fn extract_batch<S: AsRef<str>>(&self, inputs: &[(S, SourceTag)]) -> Vec<DocumentResult> {
        let mut results = Vec::with_capacity(inputs.len());
        for (i, (url, tag)) in inputs.iter().enumerate() {
            let url: &str = url.as_ref();
            info!(index = i, total = inputs.len(), url, "processing document");
            results.push(self.extract_one(url, *tag).await);
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(total = results.len(), failed, "batch finished");
        results
    }

    /// Per-document OCR texts for a batch; failed documents yield an empty list.
    pub async fn ocr_batch<S: AsRef<str>>(&self, inputs: &[(S, SourceTag)]) -> Vec<Vec<String>> {
        self.extract_batch(inputs)
            .await
            .into_iter()
            .map(|result| result.map(|doc| doc.ocr_texts).unwrap_or_default())
            .collect()
    }
}
