//! Result assembly: structured tables + fragments → the final document record.

use crate::output::{DocumentMetadata, ExtractionResult, HtmlFragment};
use crate::pipeline::structure::Structured;
use chrono::{DateTime, SecondsFormat, Utc};

/// `sourceType` of every document; pages are neither purely text nor purely scans.
pub const SOURCE_TYPE: &str = "mixed";

/// Highest page number among `fragments`, 0 when there are none.
///
/// Pages without tables contribute nothing, so this is a lower bound on the
/// real page count rather than the count itself.
pub fn total_pages(fragments: &[HtmlFragment]) -> usize {
    fragments.iter().map(|f| f.page_number).max().unwrap_or(0)
}

pub fn assemble(
    document_name: impl Into<String>,
    fragments: &[HtmlFragment],
    structured: Structured,
    processed_at: DateTime<Utc>,
) -> ExtractionResult {
    ExtractionResult {
        document_name: document_name.into(),
        total_pages: total_pages(fragments),
        tables: structured.tables,
        metadata: DocumentMetadata {
            currency: structured.currency,
            reporting_period: structured.reporting_period,
            source_type: SOURCE_TYPE.to_string(),
            processing_timestamp: processed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        },
    }
}
