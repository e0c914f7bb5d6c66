//! Pipeline stages for table extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ extract ──▶ structure ──▶ assemble
//! (path/URL) (pdfium)   (PNG)     (VLM/page)   (VLM/doc)     (result)
//!                                                 │
//!                                          recover, tabular
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into memory
//! 2. [`render`]  — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is synchronous
//! 3. [`encode`]  — PNG-encode pages and wrap them for model requests
//! 4. [`extract`] — one concurrent model call per page; failures stay local
//!    to their page
//! 5. [`structure`] — one model call for the whole document, decoded by
//!    [`recover`] and serialised to CSV by [`tabular`]
//! 6. [`assemble`] — document name, page count and metadata

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod input;
pub mod recover;
pub mod render;
pub mod structure;
pub mod tabular;
