// ABOUTME: Image acquirer: downloads and decodes accepted image URLs into RGB raster buffers.
// ABOUTME: Failures are logged and skip only the affected image; output keeps input order.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::Array3;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::resource::Fetcher;

/// A decoded image as a height × width × channel array of RGB bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: Array3<u8>,
}

impl RasterImage {
    pub const CHANNELS: usize = 3;

    /// Converts any decoded image to 8-bit RGB.
    pub fn from_dynamic(img: &DynamicImage) -> Result<Self, ndarray::ShapeError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_rgb(width, height, rgb.into_raw())
    }

    /// Builds a raster from packed row-major RGB bytes.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ndarray::ShapeError> {
        let pixels =
            Array3::from_shape_vec((height as usize, width as usize, Self::CHANNELS), data)?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Encodes the raster as PNG, e.g. for shipping to an OCR service.
    pub fn to_png(&self) -> anyhow::Result<Vec<u8>> {
        let data: Vec<u8> = self.pixels.iter().copied().collect();
        let img = RgbImage::from_raw(self.width() as u32, self.height() as u32, data)
            .ok_or_else(|| anyhow::anyhow!("raster buffer does not match its dimensions"))?;

        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

/// Decodes raw image bytes into a raster, detecting the format from magic bytes.
pub fn decode_raster(url: &str, bytes: &[u8], max_bytes: usize) -> Result<RasterImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::image_decode(
            url,
            "Decode",
            Some(anyhow::anyhow!("image data is empty")),
        ));
    }
    if bytes.len() > max_bytes {
        return Err(PipelineError::image_decode(
            url,
            "Decode",
            Some(anyhow::anyhow!(
                "image data is too large: {} bytes (max: {} bytes)",
                bytes.len(),
                max_bytes
            )),
        ));
    }

    let format = image::guess_format(bytes).map_err(|e| {
        PipelineError::image_decode(url, "Decode", Some(anyhow::anyhow!("unsupported format: {}", e)))
    })?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PipelineError::image_decode(url, "Decode", Some(anyhow::Error::new(e))))?;

    RasterImage::from_dynamic(&img)
        .map_err(|e| PipelineError::image_decode(url, "Decode", Some(anyhow::Error::new(e))))
}

/// Decodes the payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, PipelineError> {
    let invalid = |msg: &str| {
        PipelineError::image_decode(truncate_for_log(uri), "Decode", Some(anyhow::anyhow!("{}", msg)))
    };

    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URI has no payload"))?;
    if !header.ends_with(";base64") {
        return Err(invalid("only base64 data URIs are supported"));
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| PipelineError::image_decode(truncate_for_log(uri), "Decode", Some(anyhow::Error::new(e))))
}

/// Data URIs can be megabytes long; keep errors and logs readable.
fn truncate_for_log(url: &str) -> String {
    const MAX: usize = 64;
    match url.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

/// One successfully acquired image.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    /// Position of the source URL in the document's `image_urls`.
    pub index: usize,
    pub url: String,
    pub raster: RasterImage,
}

/// Downloads and decodes a document's images.
#[derive(Debug, Clone)]
pub struct ImageAcquirer {
    fetcher: Fetcher,
    concurrency: usize,
    max_image_bytes: usize,
}

impl ImageAcquirer {
    pub fn new(fetcher: Fetcher, concurrency: usize, max_image_bytes: usize) -> Self {
        Self {
            fetcher: fetcher.with_max_content_length(max_image_bytes),
            concurrency: concurrency.max(1),
            max_image_bytes,
        }
    }

    /// Fetches (or inline-decodes) and decodes one image.
    pub async fn acquire_one(&self, url: &str) -> Result<RasterImage, PipelineError> {
        let bytes = if url.starts_with("data:") {
            decode_data_uri(url)?
        } else {
            self.fetcher.fetch(url).await?.body.to_vec()
        };
        decode_raster(url, &bytes, self.max_image_bytes)
    }

    /// Acquires every URL, skipping failures.
    ///
    /// Up to `concurrency` images are in flight at once; results are always
    /// returned in input order.
    pub async fn acquire(&self, urls: &[String]) -> Vec<AcquiredImage> {
        let results: Vec<_> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move { (index, url, self.acquire_one(url).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut acquired = Vec::with_capacity(results.len());
        for (index, url, result) in results {
            match result {
                Ok(raster) => {
                    debug!(
                        url = %truncate_for_log(url),
                        width = raster.width(),
                        height = raster.height(),
                        "image acquired"
                    );
                    acquired.push(AcquiredImage {
                        index,
                        url: url.clone(),
                        raster,
                    });
                }
                Err(err) => {
                    warn!(url = %truncate_for_log(url), error = %err, "skipping image");
                }
            }
        }
        acquired
    }
}
