//! Vision OCR: rasterise the document and ask a vision model to transcribe it.
//!
//! Rendering and transcription are split so the orchestrator can render
//! once and then walk the OCR chain with the same page images. Neither
//! function retries; a failed model call surfaces as [`ProviderError`] and
//! the caller decides whether to move on to the next model.

use super::encode::{encode_image_bytes, encode_page};
use super::resolve_provider;
use crate::error::{OcrError, ProviderError};
use crate::extract::{DocumentKind, PdfEngine};
use crate::model_chain::ModelRef;
use crate::prompts::build_ocr_messages;
use crate::provider::{ChatOptions, ChatProvider, ImageData, ProviderRegistry, TokenUsage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A document as handed to the OCR step.
#[derive(Debug, Clone)]
pub struct OcrInput {
    pub kind: DocumentKind,
    pub content: Arc<[u8]>,
    pub content_type: String,
    pub dpi: u32,
    pub max_pixels: u32,
}

/// Text returned by one successful transcription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrOutput {
    pub text: String,
    pub pages: usize,
    pub usage: TokenUsage,
}

/// Produce one image per page.
///
/// PDFs are rendered through `engine` on the blocking pool; image uploads
/// become a single page; every other kind has no pages.
pub async fn render_document(
    engine: Arc<dyn PdfEngine>,
    input: &OcrInput,
) -> Result<Vec<ImageData>, OcrError> {
    match input.kind {
        DocumentKind::Pdf => {
            let content = Arc::clone(&input.content);
            let (dpi, max_pixels) = (input.dpi, input.max_pixels);
            let pages = tokio::task::spawn_blocking(move || {
                let images = engine
                    .render_pages(&content, dpi, max_pixels)
                    .map_err(|e| OcrError::Render(e.to_string()))?;
                images
                    .iter()
                    .map(|img| encode_page(img).map_err(|e| OcrError::Render(e.to_string())))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(|e| OcrError::Render(format!("render task panicked: {e}")))??;

            let total_bytes: usize = pages.iter().map(|p| p.data.len()).sum();
            info!(pages = pages.len(), total_bytes, dpi, "Rendered PDF for OCR");
            Ok(pages)
        }
        DocumentKind::Image => {
            let fallback = if input.content_type.starts_with("image/") {
                input.content_type.as_str()
            } else {
                "image/png"
            };
            Ok(vec![encode_image_bytes(&input.content, fallback)])
        }
        DocumentKind::Docx | DocumentKind::Text | DocumentKind::Unknown => Ok(Vec::new()),
    }
}

/// Send `pages` to `model` and return the transcription.
///
/// Zero pages returns empty text and zero usage without calling the
/// provider.
pub async fn transcribe(
    provider: &dyn ChatProvider,
    model: &ModelRef,
    pages: Vec<ImageData>,
    options: &ChatOptions,
) -> Result<OcrOutput, ProviderError> {
    if pages.is_empty() {
        info!(model = %model, pages = 0, "OCR skipped, nothing to transcribe");
        return Ok(OcrOutput::default());
    }

    let page_count = pages.len();
    info!(model = %model, pages = page_count, "OCR request");
    let messages = build_ocr_messages(pages);

    let start = Instant::now();
    let response = provider.chat(&model.model, &messages, options).await?;
    let latency_ms = start.elapsed().as_millis() as u64;

    if response.content.trim().is_empty() {
        warn!(model = %model, pages = page_count, "OCR returned empty text");
    } else {
        info!(
            model = %model,
            text_length = response.content.chars().count(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            latency_ms,
            "OCR response"
        );
    }

    Ok(OcrOutput {
        text: response.content,
        pages: page_count,
        usage: response.usage,
    })
}

/// Render `input` and transcribe it with a single model.
pub async fn ocr_extract(
    registry: &ProviderRegistry,
    engine: Arc<dyn PdfEngine>,
    input: &OcrInput,
    model: &ModelRef,
    options: &ChatOptions,
) -> Result<OcrOutput, OcrError> {
    let pages = render_document(engine, input).await?;
    if pages.is_empty() {
        return Ok(OcrOutput::default());
    }
    let provider = resolve_provider(registry, model)?;
    Ok(transcribe(provider.as_ref(), model, pages, options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::provider::{ChatMessage, ChatResponse};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Mutex;

    struct TwoPages;

    impl PdfEngine for TwoPages {
        fn page_texts(&self, _content: &[u8]) -> Result<Vec<String>, PdfError> {
            Ok(vec![String::new(), String::new()])
        }

        fn render_pages(&self, _c: &[u8], _dpi: u32, _max: u32) -> Result<Vec<DynamicImage>, PdfError> {
            let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
            Ok(vec![page.clone(), page])
        }
    }

    struct Unreadable;

    impl PdfEngine for Unreadable {
        fn page_texts(&self, _content: &[u8]) -> Result<Vec<String>, PdfError> {
            Err(PdfError::Unreadable("bad xref".into()))
        }

        fn render_pages(&self, _c: &[u8], _dpi: u32, _max: u32) -> Result<Vec<DynamicImage>, PdfError> {
            Err(PdfError::Unreadable("bad xref".into()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatProvider for Recorder {
        fn name(&self) -> &str {
            "openrouter"
        }

        async fn chat(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(ChatResponse {
                content: "Jane Doe\nSoftware Engineer".into(),
                usage: TokenUsage {
                    input_tokens: 1500,
                    output_tokens: 40,
                },
            })
        }
    }

    fn input(kind: DocumentKind, content_type: &str) -> OcrInput {
        OcrInput {
            kind,
            content: Arc::from(&b"bytes"[..]),
            content_type: content_type.into(),
            dpi: 200,
            max_pixels: 2000,
        }
    }

    fn model() -> ModelRef {
        ModelRef::new("openrouter", "google/gemini-flash-1.5")
    }

    #[tokio::test]
    async fn pdf_renders_one_png_per_page() {
        let pages = render_document(Arc::new(TwoPages), &input(DocumentKind::Pdf, "application/pdf"))
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.mime_type == "image/png"));
    }

    #[tokio::test]
    async fn unreadable_pdf_is_render_error() {
        let err = render_document(Arc::new(Unreadable), &input(DocumentKind::Pdf, "application/pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Render(_)));
    }

    #[tokio::test]
    async fn image_is_single_page_and_text_has_none() {
        let img = render_document(Arc::new(TwoPages), &input(DocumentKind::Image, "image/jpeg"))
            .await
            .unwrap();
        assert_eq!(img.len(), 1);
        assert_eq!(img[0].mime_type, "image/jpeg");

        let txt = render_document(Arc::new(TwoPages), &input(DocumentKind::Text, "text/plain"))
            .await
            .unwrap();
        assert!(txt.is_empty());
    }

    #[tokio::test]
    async fn zero_pages_makes_no_call() {
        let provider = Recorder::default();
        let out = transcribe(&provider, &model(), Vec::new(), &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(out, OcrOutput::default());
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcribe_sends_one_message_with_all_pages() {
        let provider = Recorder::default();
        let pages = vec![ImageData::new("AAA", "image/png"), ImageData::new("BBB", "image/png")];
        let out = transcribe(&provider, &model(), pages, &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(out.pages, 2);
        assert_eq!(out.usage.input_tokens, 1500);
        assert!(out.text.starts_with("Jane Doe"));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].images().count(), 2);
    }

    #[tokio::test]
    async fn ocr_extract_resolves_through_registry() {
        let registry = ProviderRegistry::new();
        registry.register_instance(Arc::new(Recorder::default()));
        let out = ocr_extract(
            &registry,
            Arc::new(TwoPages),
            &input(DocumentKind::Pdf, "application/pdf"),
            &model(),
            &ChatOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out.pages, 2);
    }

    #[tokio::test]
    async fn ocr_extract_unregistered_provider_is_provider_error() {
        let err = ocr_extract(
            &ProviderRegistry::new(),
            Arc::new(TwoPages),
            &input(DocumentKind::Pdf, "application/pdf"),
            &model(),
            &ChatOptions::default(),
        )
        .await
        .unwrap_err();
        match err {
            OcrError::Provider(e) => assert_eq!(e.provider, "openrouter"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
