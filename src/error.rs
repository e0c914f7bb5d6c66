//! Error types for the pdf2tables library.
//!
//! Three layers of failure, recovered as close to their source as possible:
//!
//! * [`ModelError`] — one call to the external model failed (HTTP error,
//!   refusal, empty answer). In the vision stage this is absorbed per page;
//!   in the structuring stage it fails the document.
//!
//! * [`Pdf2TablesError`] — **Fatal** for the document: the PDF cannot be
//!   parsed, pdfium cannot be loaded, the input cannot be read, or the
//!   structuring call failed.
//!
//! * [`crate::api::ApiError`] — what a caller of an endpoint sees. Built at
//!   the endpoint boundary from the two types above.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2tables library.
#[derive(Debug, Error)]
pub enum Pdf2TablesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The buffer could not be opened as a PDF document.
    #[error("Error processing PDF: {detail}")]
    DocumentParse { detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The external model call failed.
    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// No usable credential source or another startup configuration problem.
    #[error("{0}")]
    Config(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TablesError {
    /// True for failures caused by the document itself rather than by the
    /// service. These are the only ones whose detail reaches the client.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            Pdf2TablesError::DocumentParse { .. } | Pdf2TablesError::RasterisationFailed { .. }
        )
    }
}

/// A failed call to the external model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport-level failure (connection refused, TLS, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered but produced no text (blocked or empty candidate).
    #[error("Model returned no text{}", reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EmptyResponse { reason: Option<String> },

    /// Obtaining an access token failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Error reported by an `edgequake-llm` provider.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The call did not complete within the configured bound.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend does not implement this operation.
    #[error("Operation not supported by backend '{backend}': {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },
}
