//! # pdf2tables
//!
//! Extract the tables of financial-report PDFs with a Vision Language Model.
//!
//! Scanned statements, right-to-left text and merged header cells defeat
//! text-layer extractors. This crate rasterises each page instead, asks a VLM
//! to transcribe every table on it as HTML, then asks once more, with the
//! whole document in view, for structured JSON: column headers, row data,
//! source page and document metadata.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render     rasterise pages via pdfium (spawn_blocking)
//!  ├─ 2. Extract    one concurrent VLM call per page → <table> fragments
//!  ├─ 3. Structure  one VLM call for all fragments → JSON, recovered in 3 tiers
//!  └─ 4. Assemble   per-table HTML + CSV, document metadata
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tables::{api, AppState, ExtractionConfig, GeminiModel, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from GCP_SERVICE_ACCOUNT_KEY_PATH / _JSON or GEMINI_API_KEY
//!     let service = ServiceConfig::from_env()?;
//!     let state = AppState::new(
//!         Arc::new(GeminiModel::from_config(&service)?),
//!         ExtractionConfig::default(),
//!     );
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let result = api::extract_tables(&state, "report.pdf", bytes).await?;
//!     for table in &result.tables {
//!         println!("p.{} {}\n{}", table.page_number, table.title, table.csv);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tables` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ApiError, AppState, HealthStatus, ModelsResponse};
pub use config::{Credentials, ExtractionConfig, ExtractionConfigBuilder, ServiceConfig};
pub use error::{ModelError, Pdf2TablesError};
pub use model::gemini::GeminiModel;
pub use model::provider::LlmProviderModel;
pub use model::{GenerationOptions, ModelInfo, VisionModel};
pub use output::{
    DocumentMetadata, ExtractionResult, HtmlFragment, PageImage, StructureRequest, TableResult,
};
