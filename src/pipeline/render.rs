//! Page Rasterizer: PDF bytes → one PNG per page, numbered from 1.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is synchronous and
//! CPU-bound. [`render_document`] moves the work onto Tokio's blocking pool
//! so concurrent requests keep being served while a large report renders.
//!
//! The document handle lives inside [`render_blocking`]'s scope and is
//! released on every exit path, including early returns on a bad page.

use crate::error::Pdf2TablesError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_png;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rasterise every page of `bytes` at `scale`.
///
/// # Errors
/// - [`Pdf2TablesError::DocumentParse`] when the buffer is not a readable PDF
/// - [`Pdf2TablesError::RasterisationFailed`] when a page cannot be drawn or encoded
/// - [`Pdf2TablesError::PdfiumBindingFailed`] when no pdfium library is available
pub async fn render_document(bytes: Vec<u8>, scale: f32) -> Result<Vec<PageImage>, Pdf2TablesError> {
    tokio::task::spawn_blocking(move || render_blocking(bytes, scale))
        .await
        .map_err(|e| Pdf2TablesError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then a library next to the
/// executable's working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2TablesError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2TablesError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of [`render_document`].
fn render_blocking(bytes: Vec<u8>, scale: f32) -> Result<Vec<PageImage>, Pdf2TablesError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(|e| Pdf2TablesError::DocumentParse {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut images = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_number = idx + 1;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2TablesError::RasterisationFailed {
                page: page_number,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let png = encode_png(&image).map_err(|e| Pdf2TablesError::RasterisationFailed {
            page: page_number,
            detail: format!("PNG encoding failed: {}", e),
        })?;

        debug!(
            "Rendered page {} → {}x{} px, {} bytes",
            page_number,
            image.width(),
            image.height(),
            png.len()
        );
        images.push(PageImage { page_number, png });
    }

    Ok(images)
}
