//! Vision Extraction Stage: one model call per page, all pages at once.
//!
//! ## Failure isolation
//!
//! Every page runs as its own task on a [`JoinSet`]. A page whose call
//! errors, times out or even panics contributes zero fragments; its siblings
//! and the barrier are unaffected. [`extract_page`] therefore never returns
//! an error, and [`extract_document`] only ever returns a (possibly empty)
//! list.
//!
//! ## Ordering
//!
//! Fragments are merged in completion order. Page association travels with
//! each [`HtmlFragment`], never with its position in the list.

use crate::config::ExtractionConfig;
use crate::error::ModelError;
use crate::model::{GenerationOptions, VisionModel};
use crate::output::{HtmlFragment, PageImage};
use crate::prompts::HTML_EXTRACTION_PROMPT;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

static RE_TABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<table[\s\S]*?</table>").unwrap());

/// Every `<table>…</table>` span in `text`, case-insensitive and non-greedy.
///
/// Prose the model wraps around the markup is dropped.
pub fn find_tables(text: &str) -> Vec<&str> {
    RE_TABLE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Extract the tables of a single page.
///
/// Never fails: any model error is logged and turned into an empty list.
pub async fn extract_page(
    model: &dyn VisionModel,
    page: &PageImage,
    config: &ExtractionConfig,
) -> Vec<HtmlFragment> {
    let start = Instant::now();
    match call_model(model, page, config).await {
        Ok(text) => {
            let fragments: Vec<HtmlFragment> = find_tables(text.trim())
                .into_iter()
                .map(|html| HtmlFragment::new(page.page_number, html))
                .collect();
            debug!(
                "Page {}: {} tables in {:?}",
                page.page_number,
                fragments.len(),
                start.elapsed()
            );
            fragments
        }
        Err(e) => {
            warn!(
                "Error extracting tables from page {}: {}",
                page.page_number, e
            );
            Vec::new()
        }
    }
}

async fn call_model(
    model: &dyn VisionModel,
    page: &PageImage,
    config: &ExtractionConfig,
) -> Result<String, ModelError> {
    let options = GenerationOptions {
        temperature: config.temperature,
        max_output_tokens: Some(config.html_max_output_tokens),
    };
    let call = model.generate(HTML_EXTRACTION_PROMPT, Some(page), &options);

    match config.page_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| ModelError::Timeout { secs })?,
        None => call.await,
    }
}

/// Fan out one task per page and wait for all of them.
///
/// Returns the union of every page's fragments in completion order.
pub async fn extract_document(
    model: Arc<dyn VisionModel>,
    pages: Vec<PageImage>,
    config: &ExtractionConfig,
) -> Vec<HtmlFragment> {
    let total = pages.len();
    let mut tasks = JoinSet::new();

    for page in pages {
        let model = Arc::clone(&model);
        let config = config.clone();
        tasks.spawn(async move { extract_page(model.as_ref(), &page, &config).await });
    }

    let mut fragments = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(page_fragments) => fragments.extend(page_fragments),
            Err(e) => warn!("Page task aborted: {}", e),
        }
    }

    info!("Extracted {} tables from {} pages", fragments.len(), total);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    #[test]
    fn find_tables_ignores_surrounding_prose() {
        let text = "Here you go:\n<table><tr><td>1</td></tr></table>\nand\n<TABLE dir=\"rtl\"><tr><td>2</td></tr></Table> done";
        assert_eq!(
            find_tables(text),
            vec![
                "<table><tr><td>1</td></tr></table>",
                "<TABLE dir=\"rtl\"><tr><td>2</td></tr></Table>"
            ]
        );
    }

    #[test]
    fn find_tables_is_non_greedy_and_multiline() {
        let text = "<table>\n<tr><td>a</td></tr>\n</table>\n<p>x</p>\n<table><tr><td>b</td></tr></table>";
        let found = find_tables(text);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("</table>"));
        assert!(!found[0].contains("<p>"));
    }

    #[test]
    fn unterminated_table_is_not_a_match() {
        assert!(find_tables("<table><tr><td>cut off").is_empty());
        assert!(find_tables("").is_empty());
    }

    struct Scripted(Result<&'static str, u16>);

    #[async_trait]
    impl VisionModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _image: Option<&PageImage>,
            _options: &GenerationOptions,
        ) -> Result<String, ModelError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(ModelError::Api {
                    status,
                    message: "scripted failure".into(),
                }),
            }
        }
    }

    fn page(n: usize) -> PageImage {
        PageImage {
            page_number: n,
            png: Vec::new(),
        }
    }

    #[tokio::test]
    async fn page_error_becomes_empty_list() {
        let model = Scripted(Err(500));
        let fragments = extract_page(&model, &page(4), &ExtractionConfig::default()).await;
        assert!(fragments.is_empty());
    }

    #[tokio::test]
    async fn fragments_carry_their_page_number() {
        let model = Scripted(Ok("<table><tr><td>x</td></tr></table>"));
        let fragments = extract_page(&model, &page(7), &ExtractionConfig::default()).await;
        assert_eq!(
            fragments,
            vec![HtmlFragment::new(7, "<table><tr><td>x</td></tr></table>")]
        );
    }
}
