// ABOUTME: End-to-end pipeline tests against a mock HTTP server and an in-process OCR engine.
// ABOUTME: Covers batch and image-level partial failure, alignment of images and OCR texts, and ordering.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use folio::{
    DocumentState, ErrorCode, OcrEngine, Pipeline, PolitenessDelay, RasterImage, Recognizer,
    RetryPolicy, SourceTag, TextFragment,
};
use httpmock::prelude::*;
use image::{DynamicImage, ImageFormat, RgbImage};
use pretty_assertions::assert_eq;

/// Reads the shade of the first pixel back as text; shade 0 makes it fail.
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
            anyhow::bail!("unreadable image");
        }
        Ok(vec![
            TextFragment::new("img"),
            TextFragment::new(shade.to_string()),
        ])
    }
}

fn recognizer() -> (Arc<Recognizer>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = ShadeEngine {
        languages: vec!["hu".to_string(), "en".to_string()],
        calls: calls.clone(),
    };
    (Arc::new(Recognizer::new(engine).unwrap()), calls)
}

fn pipeline(recognizer: Arc<Recognizer>) -> Pipeline {
    Pipeline::builder()
        .delay(PolitenessDelay::none())
        .retry(RetryPolicy::none())
        .build(recognizer)
        .unwrap()
}

fn png_bytes(shade: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(3, 2, image::Rgb([shade, shade, shade]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn kriptoworld_page(text: &str, images: &[String]) -> String {
    let imgs: String = images
        .iter()
        .map(|src| format!(r#"<img src="{}">"#, src))
        .collect();
    format!(
        r#"<html><body>
            <div class="entry-content clearfix single-post-content">
                <p>{}</p>
                {}
            </div>
        </body></html>"#,
        text, imgs
    )
}

fn serve_page<'a>(server: &'a MockServer, path: &str, html: String) -> httpmock::Mock<'a> {
    let path = path.to_string();
    server.mock(move |when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(html);
    })
}

fn serve_png(server: &MockServer, path: &str, shade: u8) {
    let path = path.to_string();
    let body = png_bytes(shade);
    server.mock(move |when, then| {
        when.method(GET).path(path);
        then.status(200).header("content-type", "image/png").body(body);
    });
}

#[tokio::test]
async fn batch_continues_past_failed_fetch() {
    let server = MockServer::start();
    serve_page(&server, "/a", kriptoworld_page("Első cikk", &[]));
    let mock_b = server.mock(|when, then| {
        when.method(GET).path("/b");
        then.status(500);
    });
    let mock_c = serve_page(&server, "/c", kriptoworld_page("Harmadik cikk", &[]));

    let (recognizer, _) = recognizer();
    let pipeline = pipeline(recognizer);
    let inputs = vec![
        (server.url("/a"), SourceTag::Kriptoworld),
        (server.url("/b"), SourceTag::Kriptoworld),
        (server.url("/c"), SourceTag::Kriptoworld),
    ];

    let results = pipeline.extract_batch(&inputs).await;

    assert_eq!(results.len(), 3);
    mock_b.assert();
    mock_c.assert();

    let first = results[0].as_ref().expect("first document succeeds");
    assert_eq!(first.main_text.as_deref(), Some("Első cikk"));
    assert_eq!(first.url, server.url("/a"));

    let failure = results[1].as_ref().expect_err("second document fails");
    assert_eq!(failure.state, DocumentState::FetchFailed);
    assert_eq!(failure.error.code, ErrorCode::HttpStatus(500));
    assert_eq!(failure.url, server.url("/b"));

    let third = results[2].as_ref().expect("third document succeeds");
    assert_eq!(third.main_text.as_deref(), Some("Harmadik cikk"));
    assert_eq!(third.state, DocumentState::Assembled);
}

#[tokio::test]
async fn corrupt_image_shrinks_images_and_ocr_texts_only() {
    let server = MockServer::start();
    let image_urls: Vec<String> = (1..=4)
        .map(|i| server.url(format!("/uploads/image-{}.png", i)))
        .collect();

    serve_png(&server, "/uploads/image-1.png", 11);
    serve_png(&server, "/uploads/image-2.png", 22);
    server.mock(|when, then| {
        when.method(GET).path("/uploads/image-3.png");
        then.status(200)
            .header("content-type", "image/png")
            .body("this is not a png");
    });
    serve_png(&server, "/uploads/image-4.png", 44);
    serve_page(&server, "/article", kriptoworld_page("Szöveg", &image_urls));

    let (recognizer, calls) = recognizer();
    let pipeline = pipeline(recognizer);

    let doc = pipeline
        .extract_one(&server.url("/article"), SourceTag::Kriptoworld)
        .await
        .expect("document succeeds despite one bad image");

    assert_eq!(doc.image_urls, image_urls);
    assert_eq!(doc.images.len(), 3);
    assert_eq!(doc.ocr_texts, vec!["img 11", "img 22", "img 44"]);
    assert_eq!(doc.image_indices, vec![0, 1, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    for (raster, text) in doc.images.iter().zip(&doc.ocr_texts) {
        assert_eq!(text, &format!("img {}", raster.pixels()[[0, 0, 0]]));
    }
}

#[tokio::test]
async fn recognition_failure_drops_only_that_image() {
    let server = MockServer::start();
    let image_urls = vec![
        server.url("/image-dark.png"),
        server.url("/image-light.png"),
    ];
    serve_png(&server, "/image-dark.png", 0);
    serve_png(&server, "/image-light.png", 200);
    serve_page(&server, "/article", kriptoworld_page("x", &image_urls));

    let (recognizer, _) = recognizer();
    let doc = pipeline(recognizer)
        .extract_one(&server.url("/article"), SourceTag::Kriptoworld)
        .await
        .unwrap();

    assert_eq!(doc.image_urls.len(), 2);
    assert_eq!(doc.images.len(), 1);
    assert_eq!(doc.ocr_texts, vec!["img 200"]);
    assert_eq!(doc.image_indices, vec![1]);
}

#[tokio::test]
async fn missing_container_is_an_extraction_failure() {
    let server = MockServer::start();
    serve_page(
        &server,
        "/elsewhere",
        "<html><body><div class=\"comments\"><p>hi</p></div></body></html>".to_string(),
    );

    let (recognizer, calls) = recognizer();
    let failure = pipeline(recognizer)
        .extract_one(&server.url("/elsewhere"), SourceTag::Kriptoworld)
        .await
        .expect_err("no container");

    assert_eq!(failure.state, DocumentState::ExtractionFailed);
    assert!(failure.error.is_extract());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn relative_and_inline_images_are_acquired() {
    let server = MockServer::start();
    serve_png(&server, "/media/image-rel.png", 5);
    let inline = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(6)));
    let images = vec!["/media/image-rel.png".to_string(), inline.clone()];
    serve_page(&server, "/news/post", kriptoworld_page("t", &images));

    let (recognizer, _) = recognizer();
    let doc = pipeline(recognizer)
        .extract_one(&server.url("/news/post"), SourceTag::Kriptoworld)
        .await
        .unwrap();

    assert_eq!(doc.image_urls, vec![server.url("/media/image-rel.png"), inline]);
    assert_eq!(doc.ocr_texts, vec!["img 5", "img 6"]);
}

#[tokio::test]
async fn ocr_batch_has_an_entry_per_input() {
    let server = MockServer::start();
    serve_png(&server, "/image-a.png", 9);
    serve_page(
        &server,
        "/ok",
        kriptoworld_page("ok", &[server.url("/image-a.png")]),
    );
    server.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(404);
    });

    let (recognizer, _) = recognizer();
    let inputs = [
        (server.url("/gone"), SourceTag::Kriptoworld),
        (server.url("/ok"), SourceTag::Kriptoworld),
    ];
    let texts = pipeline(recognizer).ocr_batch(&inputs).await;

    assert_eq!(texts, vec![Vec::<String>::new(), vec!["img 9".to_string()]]);
}

#[tokio::test]
async fn pipelines_share_one_recognizer() {
    let (recognizer, _) = recognizer();
    let first = pipeline(recognizer.clone());
    let second = pipeline(recognizer.clone());

    assert!(Arc::ptr_eq(first.recognizer(), second.recognizer()));
    assert_eq!(first.recognizer().languages(), ["hu", "en"]);
}
