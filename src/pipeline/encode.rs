//! Image encoding for vision requests.
//!
//! Rendered PDF pages are PNG-encoded: lossless output keeps small resume
//! fonts crisp for the OCR model. Uploaded images are forwarded as-is with
//! their sniffed MIME type.

use crate::provider::ImageData;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png"))
}

/// Wrap raw image bytes without re-encoding. Falls back to `fallback_mime`
/// when the format cannot be sniffed.
pub fn encode_image_bytes(bytes: &[u8], fallback_mime: &str) -> ImageData {
    let mime = image::guess_format(bytes)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| fallback_mime.to_string());
    ImageData::new(STANDARD.encode(bytes), mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let data = encode_page(&red_square()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn raw_bytes_keep_sniffed_mime() {
        let mut png = Vec::new();
        red_square()
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let data = encode_image_bytes(&png, "image/jpeg");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), png);
    }

    #[test]
    fn unknown_bytes_use_fallback() {
        let data = encode_image_bytes(b"not an image", "image/webp");
        assert_eq!(data.mime_type, "image/webp");
    }
}
