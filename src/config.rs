//! Configuration types.
//!
//! Two structs, two lifetimes:
//!
//! * [`ExtractionConfig`] — pipeline knobs (render scale, sampling, output
//!   ceilings, placeholders). Built via [`ExtractionConfigBuilder`].
//! * [`ServiceConfig`] — process-wide settings read once from the
//!   environment at startup: credentials and the model name. Allowed
//!   origins are only parsed and logged; there is no transport here to use them.
//!   Immutable afterwards; handlers receive it by reference.

use crate::error::Pdf2TablesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Default model identifier when `GEMINI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Default for `ALLOWED_ORIGINS`.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

/// Sentinel used for metadata the model did not supply.
pub const NOT_SPECIFIED: &str = "לא צוין";

/// Markup used when a structured table cannot be matched to a fragment.
pub const PLACEHOLDER_HTML: &str = "<table>...</table>";

/// Pipeline configuration for one extraction.
///
/// # Example
/// ```rust
/// use pdf2tables::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .render_scale(2.0)
///     .page_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Zoom factor applied when rasterising each page. Default: 1.5.
    ///
    /// Large enough for small print in financial statements to stay legible,
    /// small enough to keep each PNG well below request size limits.
    pub render_scale: f32,

    /// Sampling temperature for both stages. Default: 0.1.
    pub temperature: f32,

    /// Output-token ceiling for the per-page HTML call. Default: 8192.
    pub html_max_output_tokens: u32,

    /// Output-token ceiling for the structuring call. Default: None (provider default).
    pub structure_max_output_tokens: Option<u32>,

    /// Upper bound on a single page's model call. Default: None (unbounded).
    pub page_timeout_secs: Option<u64>,

    /// Sentinel for missing currency / reporting period. Default: "לא צוין".
    pub not_specified: String,

    /// Confidence attached to every table. Default: 0.95.
    pub placeholder_confidence: f64,

    /// Markup attached to tables whose page has no fragment. Default: "<table>...</table>".
    pub placeholder_html: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            temperature: 0.1,
            html_max_output_tokens: 8192,
            structure_max_output_tokens: None,
            page_timeout_secs: None,
            not_specified: NOT_SPECIFIED.to_string(),
            placeholder_confidence: 0.95,
            placeholder_html: PLACEHOLDER_HTML.to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn html_max_output_tokens(mut self, n: u32) -> Self {
        self.config.html_max_output_tokens = n;
        self
    }

    pub fn structure_max_output_tokens(mut self, n: u32) -> Self {
        self.config.structure_max_output_tokens = Some(n);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = Some(secs);
        self
    }

    pub fn not_specified(mut self, sentinel: impl Into<String>) -> Self {
        self.config.not_specified = sentinel.into();
        self
    }

    pub fn placeholder_confidence(mut self, c: f64) -> Self {
        self.config.placeholder_confidence = c;
        self
    }

    pub fn placeholder_html(mut self, html: impl Into<String>) -> Self {
        self.config.placeholder_html = html.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TablesError> {
        let c = &self.config;
        if !(c.render_scale.is_finite() && c.render_scale > 0.0 && c.render_scale <= 8.0) {
            return Err(Pdf2TablesError::InvalidConfig(format!(
                "render scale must be in (0, 8], got {}",
                c.render_scale
            )));
        }
        if c.html_max_output_tokens == 0 {
            return Err(Pdf2TablesError::InvalidConfig(
                "HTML output-token ceiling must be ≥ 1".into(),
            ));
        }
        if c.page_timeout_secs == Some(0) {
            return Err(Pdf2TablesError::InvalidConfig(
                "page timeout must be ≥ 1 second".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.placeholder_confidence) {
            return Err(Pdf2TablesError::InvalidConfig(format!(
                "confidence must be within [0, 1], got {}",
                c.placeholder_confidence
            )));
        }
        Ok(self.config)
    }
}

// ── Service configuration ────────────────────────────────────────────────

/// Where the model credentials come from, in priority order.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `GCP_SERVICE_ACCOUNT_KEY_PATH`: path to a service-account JSON key.
    ServiceAccountFile(PathBuf),
    /// `GCP_SERVICE_ACCOUNT_KEY_JSON`: the key itself, inline.
    ServiceAccountJson(String),
    /// `GEMINI_API_KEY`: plain API key.
    ApiKey(String),
}

impl Credentials {
    /// Short label for logs, never the secret itself.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccountFile(_) => "service-account key file",
            Credentials::ServiceAccountJson(_) => "service-account key JSON",
            Credentials::ApiKey(_) => "API key",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccountFile(path) => {
                f.debug_tuple("ServiceAccountFile").field(path).finish()
            }
            Credentials::ServiceAccountJson(_) => f.write_str("ServiceAccountJson(<redacted>)"),
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub credentials: Credentials,
    pub model: String,
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, Pdf2TablesError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Pdf2TablesError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origins = lookup("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.into());
        info!("Configured allowed origins: {:?}", parse_origins(&origins));

        let credentials = resolve_credentials(&lookup, |p| p.exists())?;
        info!("Using {} for authentication", credentials.kind());

        let model = lookup("GEMINI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        info!("Using model: {}", model);

        Ok(Self {
            credentials,
            model,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Walk the three credential sources in priority order.
///
/// A key path that does not exist, or inline JSON that does not parse, is
/// skipped so the next source gets a chance.
fn resolve_credentials<F, E>(lookup: &F, exists: E) -> Result<Credentials, Pdf2TablesError>
where
    F: Fn(&str) -> Option<String>,
    E: Fn(&Path) -> bool,
{
    if let Some(path) = lookup("GCP_SERVICE_ACCOUNT_KEY_PATH").filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if exists(&path) {
            return Ok(Credentials::ServiceAccountFile(path));
        }
    }

    if let Some(json) = lookup("GCP_SERVICE_ACCOUNT_KEY_JSON").filter(|j| !j.is_empty()) {
        match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(_) => return Ok(Credentials::ServiceAccountJson(json)),
            Err(e) => error!("Invalid JSON in GCP_SERVICE_ACCOUNT_KEY_JSON: {}", e),
        }
    }

    if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
        return Ok(Credentials::ApiKey(key));
    }

    Err(Pdf2TablesError::Config(
        "No valid Google Cloud authentication found. Please provide one of:\n\
         - GCP_SERVICE_ACCOUNT_KEY_PATH (path to JSON key file)\n\
         - GCP_SERVICE_ACCOUNT_KEY_JSON (JSON key as string)\n\
         - GEMINI_API_KEY (direct API key - fallback)"
            .into(),
    ))
}
