//! Recovery of the structuring call's free-text answer.
//!
//! The model is asked for bare JSON but is not forced into it. Its answer is
//! decoded by an ordered chain of pure attempts, stopping at the first that
//! succeeds:
//!
//! | Tier | Attempt |
//! |------|---------|
//! | [`RecoveryTier::Raw`] | the whole answer as JSON |
//! | [`RecoveryTier::Fenced`] | the interior of the first ` ``` ` / ` ```json ` block |
//! | [`RecoveryTier::Fallback`] | an empty response with default metadata |
//!
//! The chain is total: whatever the model says, [`recover`] returns a value.

use crate::output::{lenient, RawStructuredTable};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

/// The structuring call's answer, decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StructuredResponse {
    /// Entries that are not objects are skipped; the others are kept.
    #[serde(default, deserialize_with = "lenient::each")]
    pub tables: Vec<RawStructuredTable>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub metadata: RawMetadata,
}

/// Document metadata as the model reported it; `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetadata {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub reporting_period: Option<String>,
}

/// Which attempt produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    Raw,
    Fenced,
    Fallback,
}

/// Decode `text` directly.
pub fn parse_raw(text: &str) -> Result<StructuredResponse, serde_json::Error> {
    serde_json::from_str(text)
}

/// Decode the interior of the first fenced block, if there is one.
pub fn parse_fenced(text: &str) -> Option<Result<StructuredResponse, serde_json::Error>> {
    RE_FENCED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|inner| serde_json::from_str(inner.as_str()))
}

/// Run the chain. Never fails.
pub fn recover(text: &str) -> (StructuredResponse, RecoveryTier) {
    if let Ok(parsed) = parse_raw(text) {
        return (parsed, RecoveryTier::Raw);
    }
    info!("Response is not valid JSON, trying to extract JSON from text");

    match parse_fenced(text) {
        Some(Ok(parsed)) => {
            info!("Successfully extracted JSON from markdown code block");
            (parsed, RecoveryTier::Fenced)
        }
        Some(Err(e)) => {
            warn!("Failed to parse JSON from fenced block: {}", e);
            (StructuredResponse::default(), RecoveryTier::Fallback)
        }
        None => {
            warn!("No JSON structure found in response");
            (StructuredResponse::default(), RecoveryTier::Fallback)
        }
    }
}
