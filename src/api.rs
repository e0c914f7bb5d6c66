//! Endpoint contracts as typed operations.
//!
//! Each public `async fn` here is one endpoint: it takes the process-wide
//! [`AppState`] plus the request, and returns either the response body or an
//! [`ApiError`] carrying the HTTP status a transport layer should send.
//!
//! | Operation | Success | Failures |
//! |-----------|---------|----------|
//! | [`extract_html`] | fragment list | 400 extension, 404 no tables, 500 |
//! | [`structure_data`] | [`ExtractionResult`] | 500 |
//! | [`extract_tables`] | [`ExtractionResult`] | union of the two above |
//! | [`health`] | [`HealthStatus`] | never |
//! | [`list_models`] | [`ModelsResponse`] | never (error envelope) |
//!
//! Unclassified failures are logged in full here and reach the caller only
//! as a generic message.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TablesError;
use crate::model::{ModelInfo, VisionModel};
use crate::output::{ExtractionResult, HtmlFragment, StructureRequest};
use crate::pipeline::assemble::assemble;
use crate::pipeline::extract::extract_document;
use crate::pipeline::render::render_document;
use crate::pipeline::structure::structure_document;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const UNSUPPORTED_FILE: &str = "Only PDF files are supported";
pub const NO_TABLES_FOUND: &str = "לא נמצאו טבלאות במסמך";
pub const PROCESSING_FAILED: &str =
    "An internal server error occurred while processing the PDF.";
pub const STRUCTURING_FAILED: &str =
    "An internal server error occurred while structuring the data.";

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
    pub config: ExtractionConfig,
}

impl AppState {
    pub fn new(model: Arc<dyn VisionModel>, config: ExtractionConfig) -> Self {
        Self { model, config }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.model.model_name())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The document itself could not be read; the detail is shown to the caller.
    DocumentParse(String),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::DocumentParse(_) => "document_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::DocumentParse(message)
            | Self::Internal(message) => message,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::DocumentParse(_) | Self::Internal(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.message().to_string(),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ApiError {}

/// Error payload as a client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Convert a fatal pipeline error at the endpoint boundary.
fn boundary_error(err: Pdf2TablesError, generic: &str) -> ApiError {
    if err.is_document_error() {
        warn!("{}", err);
        ApiError::DocumentParse(err.to_string())
    } else {
        error!("An unexpected error occurred: {:?}", err);
        ApiError::Internal(generic.to_string())
    }
}

/// Case-insensitive `.pdf` suffix check. The content is not inspected.
pub fn has_pdf_extension(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(".pdf")
}

/// Rasterise the upload and extract every table as HTML, tagged by page.
pub async fn extract_html(
    state: &AppState,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Vec<HtmlFragment>, ApiError> {
    if !has_pdf_extension(file_name) {
        return Err(ApiError::BadRequest(UNSUPPORTED_FILE.to_string()));
    }
    info!("Processing PDF: {}, size: {} bytes", file_name, bytes.len());

    let pages = render_document(bytes, state.config.render_scale)
        .await
        .map_err(|e| boundary_error(e, PROCESSING_FAILED))?;
    info!("Converted PDF to {} images", pages.len());

    let fragments = extract_document(Arc::clone(&state.model), pages, &state.config).await;
    if fragments.is_empty() {
        return Err(ApiError::NotFound(NO_TABLES_FOUND.to_string()));
    }
    Ok(fragments)
}

/// Structure previously extracted fragments. An empty fragment list is not
/// an error; it yields an empty result.
pub async fn structure_data(
    state: &AppState,
    request: StructureRequest,
) -> Result<ExtractionResult, ApiError> {
    info!(
        "Structuring {} HTML tables for '{}'",
        request.html_results.len(),
        request.document_name
    );
    let structured = structure_document(state.model.as_ref(), &request.html_results, &state.config)
        .await
        .map_err(|e| boundary_error(e, STRUCTURING_FAILED))?;

    Ok(assemble(
        request.document_name,
        &request.html_results,
        structured,
        Utc::now(),
    ))
}

/// Both stages back to back.
pub async fn extract_tables(
    state: &AppState,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<ExtractionResult, ApiError> {
    let html_results = extract_html(state, file_name, bytes).await?;
    structure_data(
        state,
        StructureRequest {
            html_results,
            document_name: file_name.to_string(),
        },
    )
    .await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub model_name: String,
}

pub fn health(state: &AppState) -> HealthStatus {
    HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        model_name: state.model.model_name().to_string(),
    }
}

/// Model listing, or the reason it failed. Either way `current_model` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelsResponse {
    Listed {
        models: Vec<ModelInfo>,
        current_model: String,
    },
    Failed {
        error: String,
        current_model: String,
    },
}

pub async fn list_models(state: &AppState) -> ModelsResponse {
    let current_model = state.model.model_name().to_string();
    match state.model.list_models().await {
        Ok(models) => ModelsResponse::Listed {
            models,
            current_model,
        },
        Err(e) => {
            error!("Error listing models: {}", e);
            ModelsResponse::Failed {
                error: e.to_string(),
                current_model,
            }
        }
    }
}
