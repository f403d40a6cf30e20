//! Image encoding: `DynamicImage` → base64 JPEG page payload.
//!
//! Every page of the book is sent with every question, so payload size
//! matters more here than lossless text edges. JPEG at quality ~90 keeps body
//! text legible to the model at a fraction of the PNG size.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Mime type of every page payload.
pub const PAGE_MIME_TYPE: &str = "image/jpeg";

/// One rasterised page, ready to be inlined into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    /// Base64 JPEG bytes, no `data:` prefix.
    pub data: String,
}

/// Encode a rendered page as base64 JPEG.
///
/// pdfium hands back RGBA bitmaps; JPEG has no alpha channel, so the image is
/// flattened to RGB first.
pub fn encode_page(
    page_num: usize,
    img: &DynamicImage,
    quality: u8,
) -> Result<PageImage, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded page {} ({}x{}) → {} bytes base64",
        page_num,
        rgb.width(),
        rgb.height(),
        data.len()
    );

    Ok(PageImage {
        page_num,
        width: rgb.width(),
        height: rgb.height(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let page = encode_page(1, &img, 92).expect("encode should succeed");
        assert_eq!(page.page_num, 1);
        assert_eq!((page.width, page.height), (10, 10));
        assert!(!page.data.is_empty());

        // JPEG SOI marker after decoding
        let raw = STANDARD.decode(&page.data).unwrap();
        assert_eq!(&raw[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn lower_quality_is_not_larger() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
        }));
        let hi = encode_page(1, &img, 100).unwrap();
        let lo = encode_page(1, &img, 10).unwrap();
        assert!(lo.data.len() <= hi.data.len());
    }
}
