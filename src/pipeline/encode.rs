//! Image encoding: `DynamicImage` → PNG bytes → base64 for the model request.
//!
//! PNG rather than JPEG: lossless compression keeps digits and thin table
//! rules crisp. JPEG ringing around small numerals is a common source of
//! misread figures.

use crate::output::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} PNG bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard base64 of raw bytes, as the inline-data fields of VLM APIs expect.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap a page for an `edgequake-llm` chat message.
///
/// `detail: "high"` keeps OpenAI-style tiling from downscaling the page to a
/// single low-resolution tile, which loses small print.
pub fn to_image_data(page: &PageImage) -> ImageData {
    ImageData::new(to_base64(&page.png), "image/png").with_detail("high")
}
