//! Data model shared by the pipeline stages and the endpoint contracts.
//!
//! Everything here is request-scoped. Wire names are camelCase so the JSON
//! produced by `extract-html` can be fed unchanged into `structure-data`.
//!
//! [`RawStructuredTable`] is decoded from model output and therefore
//! untrusted: its deserializers accept numbers, booleans and nulls where
//! strings are expected instead of rejecting the whole response.

use serde::{Deserialize, Serialize};

/// One rasterised page, PNG-encoded. Produced once per page by
/// [`crate::pipeline::render`] and consumed once by the vision stage.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Lossless PNG bytes.
    pub png: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_number", &self.page_number)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// One extracted `<table>` element tagged with its source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlFragment {
    pub page_number: usize,
    pub html: String,
}

impl HtmlFragment {
    pub fn new(page_number: usize, html: impl Into<String>) -> Self {
        Self {
            page_number,
            html: html.into(),
        }
    }
}

/// A table as structured by the model, before post-processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStructuredTable {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "lenient::rows")]
    pub raw_data: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::page_number")]
    pub page_number: usize,
}

/// A structured table as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResult {
    pub title: String,
    /// The original fragment for this page, never regenerated.
    pub html: String,
    pub raw_data: Vec<Vec<String>>,
    pub columns: Vec<String>,
    /// Fixed placeholder, not model-derived.
    pub confidence: f64,
    /// Reserved for per-table validation; always empty today.
    pub errors: Vec<String>,
    pub csv: String,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub currency: String,
    pub reporting_period: String,
    pub source_type: String,
    pub processing_timestamp: String,
}

/// Final result of the structuring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub document_name: String,
    /// Highest page number among the input fragments, 0 when there were none.
    pub total_pages: usize,
    pub tables: Vec<TableResult>,
    pub metadata: DocumentMetadata,
}

/// Request body of the structuring endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRequest {
    pub html_results: Vec<HtmlFragment>,
    pub document_name: String,
}

/// Tolerant deserializers for model-produced JSON.
///
/// None of these fail on a wrong shape: the value is coerced or replaced by
/// its default, so one odd field never discards the rest of the answer.
pub(crate) mod lenient {
    use serde::de::{DeserializeOwned, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;
    use tracing::warn;

    pub(crate) fn value_to_string(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Value::deserialize(d).map(value_to_string)
    }

    pub(crate) fn optional_string<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            other => Ok(Some(value_to_string(other))),
        }
    }

    /// An array of cells; anything else is an empty list.
    pub(crate) fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().map(value_to_string).collect(),
            _ => Vec::new(),
        })
    }

    /// An array of rows. A row that is a bare value becomes a one-cell row,
    /// a null row an empty one.
    pub(crate) fn rows<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Array(cells) => cells.into_iter().map(value_to_string).collect(),
                    Value::Null => Vec::new(),
                    cell => vec![value_to_string(cell)],
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// A non-negative integer, possibly written as `3.0` or `"3"`. Anything
    /// else is page 0, which no fragment carries.
    pub(crate) fn page_number<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
        let value = Value::deserialize(d)?;
        let parsed = match &value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(parsed.and_then(|n| usize::try_from(n).ok()).unwrap_or(0))
    }

    /// Decode each array element on its own, skipping the ones that do not fit.
    pub(crate) fn each<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match T::deserialize(item) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("Skipping malformed entry: {}", e);
                        None
                    }
                })
                .collect(),
            Value::Null => Vec::new(),
            other => {
                warn!("Expected a list, got {}", other);
                Vec::new()
            }
        })
    }

    /// The decoded value, or `T::default()` when it does not fit.
    pub(crate) fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(T::deserialize(Value::deserialize(d)?).unwrap_or_default())
    }
}
