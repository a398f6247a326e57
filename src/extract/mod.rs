//! Algorithmic text extraction.
//!
//! [`extract_document`] routes raw bytes to the right extractor. The
//! content-type wins when it names a known format; otherwise the filename
//! extension decides. A format we cannot read algorithmically (images, or
//! anything unknown) is a valid outcome with empty text, not an error: it
//! tells the orchestrator that only OCR can help.

pub mod docx;
pub mod pdf;

pub use pdf::{PdfEngine, PdfiumEngine};

use crate::error::{ExtractionError, PdfError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Separator placed between the text of consecutive PDF pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Document formats the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
    Image,
    Unknown,
}

impl DocumentKind {
    /// Human-readable label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Text => "text",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }
}

/// How the text in an [`ExtractionResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Algorithmic,
    None,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Algorithmic => "algorithmic",
            Self::None => "none",
        }
    }
}

/// Output of algorithmic extraction. Produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub pages: usize,
    pub method: ExtractionMethod,
    pub kind: DocumentKind,
}

impl ExtractionResult {
    fn none(kind: DocumentKind, pages: usize) -> Self {
        Self {
            text: String::new(),
            pages,
            method: ExtractionMethod::None,
            kind,
        }
    }

    fn algorithmic(kind: DocumentKind, text: String, pages: usize) -> Self {
        Self {
            text,
            pages,
            method: ExtractionMethod::Algorithmic,
            kind,
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Classify a document by content-type first, then filename extension.
pub fn detect_kind(content_type: &str, filename: &str) -> DocumentKind {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let by_type = match ct.as_str() {
        "application/pdf" => Some(DocumentKind::Pdf),
        DOCX_CONTENT_TYPE => Some(DocumentKind::Docx),
        "text/plain" | "text/markdown" | "text/x-markdown" => Some(DocumentKind::Text),
        "image/png" | "image/jpeg" | "image/webp" | "image/tiff" => Some(DocumentKind::Image),
        _ => None,
    };
    if let Some(kind) = by_type {
        return kind;
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => DocumentKind::Pdf,
        "docx" => DocumentKind::Docx,
        "txt" | "md" | "markdown" => DocumentKind::Text,
        "png" | "jpg" | "jpeg" | "webp" | "tif" | "tiff" => DocumentKind::Image,
        _ => DocumentKind::Unknown,
    }
}

/// Content type implied by a filename's extension, for callers that only
/// have a path. Unknown extensions map to `application/octet-stream`.
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => DOCX_CONTENT_TYPE,
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Extract text from `content`.
///
/// PDF and DOCX parsing run on the blocking pool. Corrupt bytes for a
/// recognised format yield [`ExtractionError::Corrupt`] carrying `filename`.
pub async fn extract_document(
    engine: Arc<dyn PdfEngine>,
    content: Arc<[u8]>,
    content_type: &str,
    filename: &str,
) -> Result<ExtractionResult, ExtractionError> {
    let kind = detect_kind(content_type, filename);
    debug!(?kind, content_type, filename, bytes = content.len(), "Dispatching extraction");

    let result = match kind {
        DocumentKind::Pdf => {
            let texts = tokio::task::spawn_blocking(move || engine.page_texts(&content))
                .await
                .map_err(|e| ExtractionError::Internal(format!("PDF task panicked: {e}")))?
                .map_err(|e| pdf_failure(e, filename))?;
            let pages = texts.len();
            ExtractionResult::algorithmic(kind, texts.join(PAGE_SEPARATOR), pages)
        }
        DocumentKind::Docx => {
            let text = tokio::task::spawn_blocking(move || docx::extract_docx_text(&content))
                .await
                .map_err(|e| ExtractionError::Internal(format!("DOCX task panicked: {e}")))?
                .map_err(|detail| ExtractionError::Corrupt {
                    filename: filename.to_string(),
                    kind: kind.label(),
                    detail,
                })?;
            ExtractionResult::algorithmic(kind, text, 1)
        }
        DocumentKind::Text => {
            ExtractionResult::algorithmic(kind, String::from_utf8_lossy(&content).into_owned(), 1)
        }
        DocumentKind::Image => ExtractionResult::none(kind, 1),
        DocumentKind::Unknown => ExtractionResult::none(kind, 0),
    };

    info!(
        kind = kind.label(),
        method = result.method.as_str(),
        pages = result.pages,
        chars = result.char_count(),
        "Extraction complete"
    );
    Ok(result)
}

fn pdf_failure(err: PdfError, filename: &str) -> ExtractionError {
    match err {
        PdfError::Binding(detail) => ExtractionError::EngineUnavailable(detail),
        other => ExtractionError::Corrupt {
            filename: filename.to_string(),
            kind: DocumentKind::Pdf.label(),
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    /// Engine returning canned page texts, or an unreadable-document error.
    struct CannedPdf(Option<Vec<&'static str>>);

    impl PdfEngine for CannedPdf {
        fn page_texts(&self, _content: &[u8]) -> Result<Vec<String>, PdfError> {
            match &self.0 {
                Some(pages) => Ok(pages.iter().map(|p| p.to_string()).collect()),
                None => Err(PdfError::Unreadable("xref table missing".into())),
            }
        }

        fn render_pages(&self, _: &[u8], _: u32, _: u32) -> Result<Vec<DynamicImage>, PdfError> {
            Ok(Vec::new())
        }
    }

    fn engine(pages: Option<Vec<&'static str>>) -> Arc<dyn PdfEngine> {
        Arc::new(CannedPdf(pages))
    }

    fn bytes(b: &[u8]) -> Arc<[u8]> {
        Arc::from(b)
    }

    #[test]
    fn content_type_wins_over_extension() {
        assert_eq!(detect_kind("application/pdf", "resume.docx"), DocumentKind::Pdf);
        assert_eq!(detect_kind(DOCX_CONTENT_TYPE, "resume.pdf"), DocumentKind::Docx);
    }

    #[test]
    fn extension_is_fallback() {
        assert_eq!(detect_kind("", "CV.PDF"), DocumentKind::Pdf);
        assert_eq!(detect_kind("application/octet-stream", "cv.docx"), DocumentKind::Docx);
        assert_eq!(detect_kind("", "notes.md"), DocumentKind::Text);
        assert_eq!(detect_kind("", "scan.jpeg"), DocumentKind::Image);
        assert_eq!(detect_kind("", "resume.pages"), DocumentKind::Unknown);
        assert_eq!(detect_kind("", ""), DocumentKind::Unknown);
    }

    #[test]
    fn guessed_content_type_round_trips_to_kind() {
        for name in ["cv.pdf", "cv.docx", "cv.txt", "cv.md", "scan.TIF"] {
            let kind = detect_kind(guess_content_type(name), "");
            assert_eq!(kind, detect_kind("", name), "{name}");
        }
        assert_eq!(guess_content_type("cv.rtf"), "application/octet-stream");
    }

    #[test]
    fn content_type_parameters_and_case_ignored() {
        assert_eq!(detect_kind(" Text/Plain; charset=utf-8 ", "x"), DocumentKind::Text);
        assert_eq!(detect_kind("IMAGE/PNG", "x"), DocumentKind::Image);
    }

    #[tokio::test]
    async fn pdf_pages_joined_with_separator() {
        let r = extract_document(engine(Some(vec!["Page one", "Page two"])), bytes(b"%PDF"), "application/pdf", "cv.pdf")
            .await
            .unwrap();
        assert_eq!(r.text, "Page one\n\nPage two");
        assert_eq!(r.pages, 2);
        assert_eq!(r.method, ExtractionMethod::Algorithmic);
        assert_eq!(r.word_count(), 4);
    }

    #[tokio::test]
    async fn corrupt_pdf_carries_filename() {
        let err = extract_document(engine(None), bytes(b"garbage"), "application/pdf", "broken.pdf")
            .await
            .unwrap_err();
        match err {
            ExtractionError::Corrupt { filename, kind, .. } => {
                assert_eq!(filename, "broken.pdf");
                assert_eq!(kind, "PDF");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn docx_is_extracted() {
        let content = docx::tests::docx_bytes(&docx::tests::para("Jane Doe"));
        let r = extract_document(engine(None), Arc::from(content), "", "cv.docx")
            .await
            .unwrap();
        assert_eq!(r.text, "Jane Doe");
        assert_eq!(r.pages, 1);
        assert_eq!(r.kind, DocumentKind::Docx);
    }

    #[tokio::test]
    async fn corrupt_docx_is_fatal_error() {
        let err = extract_document(engine(None), bytes(b"PK\x03\x04nope"), DOCX_CONTENT_TYPE, "cv.docx")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Corrupt { ref filename, .. } if filename == "cv.docx"));
    }

    #[tokio::test]
    async fn text_is_decoded_lossily() {
        let r = extract_document(engine(None), bytes(b"Caf\xC3\xA9 \xFF ok"), "text/plain", "")
            .await
            .unwrap();
        assert_eq!(r.text, "Café \u{FFFD} ok");
        assert_eq!(r.char_count(), 9);
    }

    #[tokio::test]
    async fn image_needs_ocr() {
        let r = extract_document(engine(None), bytes(b"\x89PNG"), "image/png", "scan.png")
            .await
            .unwrap();
        assert_eq!(r.text, "");
        assert_eq!(r.pages, 1);
        assert_eq!(r.method, ExtractionMethod::None);
    }

    #[tokio::test]
    async fn unknown_kind_is_not_an_error() {
        let r = extract_document(engine(None), bytes(b"???"), "application/x-unknown", "blob.bin")
            .await
            .unwrap();
        assert_eq!(r.pages, 0);
        assert_eq!(r.method, ExtractionMethod::None);
        assert_eq!(r.kind, DocumentKind::Unknown);
    }
}
