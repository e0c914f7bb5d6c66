//! Integration tests for the two-stage pipeline and the endpoint contracts.
//!
//! The model is a scripted in-memory [`VisionModel`]; no network is used.
//! Tests that rasterise a PDF need the pdfium shared library and print
//! `SKIP` when it cannot be bound:
//!
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use pdf2tables::api::{self, ApiError, ModelsResponse};
use pdf2tables::pipeline::extract::extract_document;
use pdf2tables::pipeline::render::bind_pdfium;
use pdf2tables::{
    AppState, ExtractionConfig, GenerationOptions, HtmlFragment, ModelError, PageImage,
    StructureRequest, VisionModel,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// What a scripted page call does.
#[derive(Clone)]
enum PageScript {
    Answer { delay_ms: u64, text: &'static str },
    Fail,
    Panic,
}

/// Per-page answers for the vision stage, one fixed answer for the
/// structuring call (the only call made without an image).
struct ScriptedModel {
    pages: HashMap<usize, PageScript>,
    structuring: &'static str,
    structuring_prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(structuring: &'static str) -> Self {
        Self {
            pages: HashMap::new(),
            structuring,
            structuring_prompts: Mutex::new(Vec::new()),
        }
    }

    fn page(mut self, n: usize, script: PageScript) -> Self {
        self.pages.insert(n, script);
        self
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&PageImage>,
        _options: &GenerationOptions,
    ) -> Result<String, ModelError> {
        let Some(page) = image else {
            self.structuring_prompts
                .lock()
                .unwrap()
                .push(prompt.to_string());
            return Ok(self.structuring.to_string());
        };
        match self.pages.get(&page.page_number).cloned() {
            Some(PageScript::Answer { delay_ms, text }) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(text.to_string())
            }
            Some(PageScript::Fail) => Err(ModelError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            Some(PageScript::Panic) => panic!("page {} crashed", page.page_number),
            None => Ok(String::new()),
        }
    }
}

fn state(model: ScriptedModel) -> AppState {
    AppState::new(Arc::new(model), ExtractionConfig::default())
}

fn pages(n: usize) -> Vec<PageImage> {
    (1..=n)
        .map(|page_number| PageImage {
            page_number,
            png: Vec::new(),
        })
        .collect()
}

/// A hand-written PDF with `n` blank pages.
fn blank_pdf(n: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut pdf = String::from("%PDF-1.4\n");
    pdf.push_str("1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    pdf.push_str(&format!(
        "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
        kids.join(" "),
        n
    ));
    for i in 0..n {
        pdf.push_str(&format!(
            "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >> endobj\n",
            i + 3
        ));
    }
    pdf.push_str("trailer << /Root 1 0 R >>\n%%EOF\n");
    pdf.into_bytes()
}

/// Skip this test if pdfium cannot be bound.
macro_rules! skip_unless_pdfium {
    () => {{
        if let Err(e) = bind_pdfium() {
            println!("SKIP — {e}");
            return;
        }
    }};
}

fn parse_csv(text: &str) -> (Vec<String>, usize) {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    (header, reader.records().count())
}

const T1: &str = "<table><tr><td>one</td></tr></table>";
const T2A: &str = "<table><tr><td>two-a</td></tr></table>";
const T2B: &str = "<table><tr><td>two-b</td></tr></table>";
const T3: &str = "<table><tr><td>three</td></tr></table>";

// ── Vision stage ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn union_of_fragments_regardless_of_completion_order() {
    // Page 1 finishes last, page 3 first.
    let model = ScriptedModel::new("{}")
        .page(1, PageScript::Answer { delay_ms: 120, text: T1 })
        .page(
            2,
            PageScript::Answer {
                delay_ms: 60,
                text: "Here are the tables:\n<table><tr><td>two-a</td></tr></table>\n\
                       <table><tr><td>two-b</td></tr></table>\nDone.",
            },
        )
        .page(3, PageScript::Answer { delay_ms: 0, text: T3 })
        .page(4, PageScript::Fail);

    let mut fragments =
        extract_document(Arc::new(model), pages(5), &ExtractionConfig::default()).await;
    fragments.sort_by(|a, b| (a.page_number, &a.html).cmp(&(b.page_number, &b.html)));

    assert_eq!(
        fragments,
        vec![
            HtmlFragment::new(1, T1),
            HtmlFragment::new(2, T2A),
            HtmlFragment::new(2, T2B),
            HtmlFragment::new(3, T3),
        ]
    );
}

#[tokio::test]
async fn panicking_page_leaves_siblings_intact() {
    let model = ScriptedModel::new("{}")
        .page(1, PageScript::Answer { delay_ms: 50, text: T1 })
        .page(2, PageScript::Panic)
        .page(3, PageScript::Answer { delay_ms: 0, text: T3 });

    let mut fragments =
        extract_document(Arc::new(model), pages(3), &ExtractionConfig::default()).await;
    fragments.sort_by_key(|f| f.page_number);

    assert_eq!(
        fragments,
        vec![HtmlFragment::new(1, T1), HtmlFragment::new(3, T3)]
    );
}

#[tokio::test]
async fn slow_page_is_dropped_when_a_timeout_is_set() {
    let model = ScriptedModel::new("{}")
        .page(1, PageScript::Answer { delay_ms: 0, text: T1 })
        .page(2, PageScript::Answer { delay_ms: 3_000, text: T2A });
    let config = ExtractionConfig::builder()
        .page_timeout_secs(1)
        .build()
        .unwrap();

    let fragments = extract_document(Arc::new(model), pages(2), &config).await;
    assert_eq!(fragments, vec![HtmlFragment::new(1, T1)]);
}

// ── extract-html contract ────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_extension_is_a_bad_request() {
    let err = api::extract_html(&state(ScriptedModel::new("{}")), "report.docx", blank_pdf(1))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::BadRequest("Only PDF files are supported".into()));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn every_page_failing_is_not_found() {
    skip_unless_pdfium!();
    let model = ScriptedModel::new("{}")
        .page(1, PageScript::Fail)
        .page(2, PageScript::Answer { delay_ms: 0, text: "No tables on this page." });

    let err = api::extract_html(&state(model), "empty.PDF", blank_pdf(2))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.message(), "לא נמצאו טבלאות במסמך");
}

#[tokio::test]
async fn unreadable_pdf_reports_the_cause() {
    skip_unless_pdfium!();
    let err = api::extract_html(&state(ScriptedModel::new("{}")), "fake.pdf", b"hello".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DocumentParse(_)), "got {err:?}");
    assert_eq!(err.status_code(), 500);
    assert!(err.message().starts_with("Error processing PDF"));
}

#[tokio::test]
async fn extract_html_then_structure_data_round_trip() {
    skip_unless_pdfium!();
    let model = ScriptedModel::new(
        r#"{"tables": [
              {"title": "Revenue", "columns": ["Item", "2023"], "rawData": [["Sales", "10"]], "pageNumber": 3},
              {"title": "Costs", "columns": ["Item"], "rawData": [["Rent"], ["Wages"]], "pageNumber": 1}
            ],
            "metadata": {"currency": "ILS", "reportingPeriod": "2023"}}"#,
    )
    .page(1, PageScript::Answer { delay_ms: 30, text: T1 })
    .page(3, PageScript::Answer { delay_ms: 0, text: T3 });
    let state = state(model);

    let html_results = api::extract_html(&state, "annual.pdf", blank_pdf(4))
        .await
        .unwrap();
    assert_eq!(html_results.len(), 2);

    // Through JSON, as a client would send it back.
    let body = serde_json::json!({ "htmlResults": html_results, "documentName": "annual.pdf" });
    let request: StructureRequest = serde_json::from_value(body).unwrap();
    let result = api::structure_data(&state, request).await.unwrap();

    assert_eq!(result.total_pages, 3);
    assert_eq!(result.tables[0].html, T3);
    assert_eq!(result.tables[1].html, T1);
    assert_eq!(result.metadata.currency, "ILS");
}

// ── structure-data contract ──────────────────────────────────────────────────

#[tokio::test]
async fn single_table_example() {
    let model = ScriptedModel::new(
        r#"{"tables": [{"title": "T", "columns": ["A"], "rawData": [["A"]], "pageNumber": 1}],
            "metadata": {"currency": "USD", "reportingPeriod": "2022"}}"#,
    );
    let request = StructureRequest {
        html_results: vec![HtmlFragment::new(1, "<table><tr><td>A</td></tr></table>")],
        document_name: "report.pdf".into(),
    };

    let result = api::structure_data(&state(model), request).await.unwrap();

    assert_eq!(result.document_name, "report.pdf");
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.tables.len(), 1);
    let table = &result.tables[0];
    assert_eq!(table.html, "<table><tr><td>A</td></tr></table>");
    assert_eq!(table.csv, "\"A\"\r\n\"A\"\r\n");
    assert_eq!(table.page_number, 1);
    assert_eq!(result.metadata.source_type, "mixed");
}

#[tokio::test]
async fn fenced_answer_with_prose_is_recovered() {
    let model = ScriptedModel::new(
        "Of course! Here is the structured data:\n\n```json\n\
         {\"tables\": [{\"title\": \"Assets\", \"columns\": [\"Item\", \"Value\"], \
         \"rawData\": [[\"Cash\", \"1,000\"], [\"Inventory\", \"250\"]], \"pageNumber\": 2}], \
         \"metadata\": {\"currency\": \"EUR\", \"reportingPeriod\": \"H1 2024\"}}\n```\n\nHope this helps.",
    );
    let request = StructureRequest {
        html_results: vec![HtmlFragment::new(2, T2A)],
        document_name: "h1.pdf".into(),
    };

    let result = api::structure_data(&state(model), request).await.unwrap();

    assert_eq!(result.tables.len(), 1);
    assert_eq!(result.metadata.currency, "EUR");
    assert_eq!(result.metadata.reporting_period, "H1 2024");

    let table = &result.tables[0];
    let (header, rows) = parse_csv(&table.csv);
    assert_eq!(header, table.columns);
    assert_eq!(rows, table.raw_data.len());
}

#[tokio::test]
async fn unrecoverable_answer_yields_empty_result() {
    let model = ScriptedModel::new("I'm sorry, I can't help with that.");
    let request = StructureRequest {
        html_results: vec![HtmlFragment::new(5, T1)],
        document_name: "x.pdf".into(),
    };

    let result = api::structure_data(&state(model), request).await.unwrap();

    assert!(result.tables.is_empty());
    assert_eq!(result.total_pages, 5);
    assert_eq!(result.metadata.currency, "לא צוין");
    assert_eq!(result.metadata.reporting_period, "לא צוין");
}

#[tokio::test]
async fn table_on_unknown_page_is_kept_with_placeholder() {
    let model = ScriptedModel::new(
        r#"{"tables": [
              {"title": "Known", "columns": ["a"], "rawData": [], "pageNumber": 1},
              {"title": "Ghost", "columns": ["a"], "rawData": [["1"]], "pageNumber": 8}
            ]}"#,
    );
    let request = StructureRequest {
        html_results: vec![HtmlFragment::new(1, T1)],
        document_name: "x.pdf".into(),
    };

    let result = api::structure_data(&state(model), request).await.unwrap();

    assert_eq!(result.tables.len(), 2);
    assert_eq!(result.tables[1].title, "Ghost");
    assert_eq!(result.tables[1].html, "<table>...</table>");
}

#[tokio::test]
async fn empty_request_is_still_a_success() {
    let model = ScriptedModel::new(r#"{"tables": [], "metadata": {}}"#);
    let request = StructureRequest {
        html_results: Vec::new(),
        document_name: "blank.pdf".into(),
    };
    let result = api::structure_data(&state(model), request).await.unwrap();
    assert_eq!(result.total_pages, 0);
    assert!(result.tables.is_empty());
}

#[tokio::test]
async fn structuring_prompt_carries_page_markers() {
    let model = Arc::new(ScriptedModel::new("{}"));
    let state = AppState::new(model.clone(), ExtractionConfig::default());
    let request = StructureRequest {
        html_results: vec![HtmlFragment::new(4, T1), HtmlFragment::new(2, T2A)],
        document_name: "x.pdf".into(),
    };
    api::structure_data(&state, request).await.unwrap();

    let prompts = model.structuring_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with(&format!(
        "<!-- Page 4 -->\n{T1}\n\n<!-- Page 2 -->\n{T2A}"
    )));
}

// ── health / models ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_model_name() {
    let status = api::health(&state(ScriptedModel::new("{}")));
    assert_eq!(status.status, "healthy");
    assert_eq!(status.model_name, "scripted-model");

    let json = serde_json::to_value(&status).unwrap();
    assert!(json.get("modelName").is_some());
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn models_failure_is_an_envelope_not_an_error() {
    // The scripted model does not implement listing.
    let response = api::list_models(&state(ScriptedModel::new("{}"))).await;
    match &response {
        ModelsResponse::Failed {
            error,
            current_model,
        } => {
            assert!(error.contains("list_models"));
            assert_eq!(current_model, "scripted-model");
        }
        other => panic!("expected error envelope, got {other:?}"),
    }
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["current_model"], "scripted-model");
}
