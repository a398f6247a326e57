//! PDF access: per-page text and page rasterisation via pdfium.
//!
//! Both operations sit behind [`PdfEngine`] so the pipeline can be driven
//! by an in-memory fake in tests. [`PdfiumEngine`] is the production
//! implementation.
//!
//! ## Threading
//!
//! pdfium is a C++ library with thread-local state; callers run engine
//! methods inside `tokio::task::spawn_blocking`, and each call binds its own
//! `Pdfium` instance rather than sharing one across threads.

use crate::error::PdfError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Blocking PDF operations needed by extraction and OCR.
pub trait PdfEngine: Send + Sync {
    /// Text of every page in order. An image-only page yields an empty string.
    fn page_texts(&self, content: &[u8]) -> Result<Vec<String>, PdfError>;

    /// Rasterise every page at `dpi`, capping the longest edge at `max_pixels`.
    fn render_pages(
        &self,
        content: &[u8],
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, PdfError>;
}

/// [`PdfEngine`] backed by a dynamically loaded pdfium library.
///
/// Binding order: explicit path (file or directory), then `PDFIUM_LIB_PATH`,
/// then the current directory, then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfError> {
        let local = match &self.library_path {
            Some(p) if p.is_dir() => Pdfium::pdfium_platform_library_name_at_path(p),
            Some(p) => p.clone(),
            None => Pdfium::pdfium_platform_library_name_at_path(Path::new("./")),
        };
        let bindings = Pdfium::bind_to_library(&local)
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::Binding(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfEngine for PdfiumEngine {
    fn page_texts(&self, content: &[u8]) -> Result<Vec<String>, PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(content, None)
            .map_err(|e| PdfError::Unreadable(format!("{e:?}")))?;

        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| PdfError::Unreadable(format!(
                "page {}: {e:?}",
                idx + 1
            )))?;
            texts.push(text.all());
        }
        info!("PDF text extracted: {} pages", texts.len());
        Ok(texts)
    }

    fn render_pages(
        &self,
        content: &[u8],
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(content, None)
            .map_err(|e| PdfError::Unreadable(format!("{e:?}")))?;

        let scale = dpi as f32 / POINTS_PER_INCH;
        let mut images = Vec::new();

        for (idx, page) in document.pages().iter().enumerate() {
            let (width, height) = target_size(
                page.width().value * scale,
                page.height().value * scale,
                max_pixels,
            );
            let render_config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| PdfError::Render {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

/// Scale `(width, height)` down so neither edge exceeds `max_pixels`.
fn target_size(width: f32, height: f32, max_pixels: u32) -> (i32, i32) {
    let longest = width.max(height);
    let factor = if longest > max_pixels as f32 {
        max_pixels as f32 / longest
    } else {
        1.0
    };
    (
        ((width * factor).round() as i32).max(1),
        ((height * factor).round() as i32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_200_dpi_fits_cap() {
        // US Letter is 612 × 792 pt.
        let scale = 200.0 / POINTS_PER_INCH;
        let (w, h) = target_size(612.0 * scale, 792.0 * scale, 2000);
        assert!(h <= 2000);
        assert_eq!(h, 2000);
        assert!(w < h);
    }

    #[test]
    fn small_page_is_not_upscaled() {
        assert_eq!(target_size(300.0, 400.0, 2000), (300, 400));
    }

    #[test]
    fn degenerate_page_keeps_one_pixel() {
        assert_eq!(target_size(0.0, 0.0, 2000), (1, 1));
    }

    #[test]
    fn explicit_library_path_is_kept() {
        let engine = PdfiumEngine::with_library_path("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(
            engine.library_path.as_deref(),
            Some(Path::new("/opt/pdfium/lib/libpdfium.so"))
        );
    }
}
