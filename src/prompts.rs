//! Instructions sent to the model by the two pipeline stages.
//!
//! All prompt text and output-shape assumptions live here so the backend in
//! [`crate::model`] stays provider-neutral.

/// Instruction for the per-page vision call.
pub const HTML_EXTRACTION_PROMPT: &str = "From the provided image of a document page, extract ALL tables into clean, semantic HTML `<table>` elements.
Preserve the original text and structure, including headers and rows.
Use proper Hebrew text direction (right-to-left) and formatting.
If no tables are found on the page, return an empty string.
Only return the HTML table elements, no additional text or explanations.";

/// Shape the structuring call is asked to produce.
pub const STRUCTURE_SCHEMA_EXAMPLE: &str = r#"{
  "tables": [
    {
      "title": "Table title",
      "columns": ["Column1", "Column2", ...],
      "rawData": [["Row1Col1", "Row1Col2"], ["Row2Col1", "Row2Col2"], ...],
      "pageNumber": 1
    }
  ],
  "metadata": {
    "currency": "Currency",
    "reportingPeriod": "Period"
  }
}"#;

/// Marker placed before each fragment. The page number is read back by the
/// model and must come out unchanged as `pageNumber`.
pub fn page_marker(page_number: usize) -> String {
    format!("<!-- Page {page_number} -->")
}

/// Build the structuring instruction around the concatenated fragments.
pub fn structure_prompt(html_input: &str, not_specified: &str) -> String {
    format!(
        "Please analyze the following HTML tables extracted from a multi-page financial document.
Structure the information into a single JSON object according to the structure below.
Infer the overall document metadata (currency, reporting period) from the content.
Use '{not_specified}' for currency or reportingPeriod when they cannot be found.
It is critical that the 'pageNumber' for each table in the output corresponds to the source page number indicated in the HTML comments (e.g., {example_marker}), not to the table's position in the list.

IMPORTANT: Return ONLY valid JSON without any additional text, markdown formatting, or explanation.
The JSON should follow this structure:
{schema}

Here are the HTML tables to analyze:

{html_input}",
        example_marker = page_marker(4),
        schema = STRUCTURE_SCHEMA_EXAMPLE,
    )
}
