//! Structuring Stage: all fragments of a document → one model call → tables.
//!
//! Fragments are concatenated behind `<!-- Page N -->` markers so the model
//! can report each table's source page. Its free-text answer goes through
//! [`recover`]; every recovered table is then post-processed:
//!
//! - `html` is the first input fragment with the same page number, or the
//!   placeholder markup when the model reported a page that has none
//! - `csv` is rendered from `columns` + `rawData`
//! - `confidence` and `errors` are fixed placeholders
//!
//! Missing metadata is replaced by the "not specified" sentinel.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TablesError;
use crate::model::{GenerationOptions, VisionModel};
use crate::output::{HtmlFragment, RawStructuredTable, TableResult};
use crate::pipeline::recover::{recover, RecoveryTier};
use crate::pipeline::tabular::to_csv;
use crate::prompts::{page_marker, structure_prompt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tables and document metadata produced by one structuring call.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured {
    pub tables: Vec<TableResult>,
    pub currency: String,
    pub reporting_period: String,
    pub tier: RecoveryTier,
}

/// Concatenate fragments in the order given, each behind its page marker.
pub fn build_html_input(fragments: &[HtmlFragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("{}\n{}", page_marker(f.page_number), f.html))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run the structuring call over `fragments`.
///
/// # Errors
/// A failed model call fails the whole document; an unreadable answer does
/// not (it yields zero tables).
pub async fn structure_document(
    model: &dyn VisionModel,
    fragments: &[HtmlFragment],
    config: &ExtractionConfig,
) -> Result<Structured, Pdf2TablesError> {
    let start = Instant::now();
    let prompt = structure_prompt(&build_html_input(fragments), &config.not_specified);
    let options = GenerationOptions {
        temperature: config.temperature,
        max_output_tokens: config.structure_max_output_tokens,
    };

    let text = model.generate(&prompt, None, &options).await?;
    debug!(
        "Structuring answer: {} chars in {:?}",
        text.len(),
        start.elapsed()
    );

    let (response, tier) = recover(text.trim());
    let tables = response
        .tables
        .into_iter()
        .map(|table| finish_table(table, fragments, config))
        .collect::<Vec<_>>();
    info!("Structured {} tables ({:?})", tables.len(), tier);

    Ok(Structured {
        tables,
        currency: or_sentinel(response.metadata.currency, config),
        reporting_period: or_sentinel(response.metadata.reporting_period, config),
        tier,
    })
}

fn or_sentinel(value: Option<String>, config: &ExtractionConfig) -> String {
    value.unwrap_or_else(|| config.not_specified.clone())
}

fn finish_table(
    table: RawStructuredTable,
    fragments: &[HtmlFragment],
    config: &ExtractionConfig,
) -> TableResult {
    let html = match fragments.iter().find(|f| f.page_number == table.page_number) {
        Some(fragment) => fragment.html.clone(),
        None => {
            warn!(
                "Table '{}' reports page {} which has no fragment",
                table.title, table.page_number
            );
            config.placeholder_html.clone()
        }
    };

    let csv = to_csv(&table.columns, &table.raw_data).unwrap_or_else(|e| {
        warn!("CSV rendering failed for '{}': {}", table.title, e);
        String::new()
    });

    TableResult {
        title: table.title,
        html,
        raw_data: table.raw_data,
        columns: table.columns,
        confidence: config.placeholder_confidence,
        errors: Vec::new(),
        csv,
        page_number: table.page_number,
    }
}
