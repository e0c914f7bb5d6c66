//! CLI binary for pdf2tables.
//!
//! A thin shim over the library's endpoint operations: one subcommand per
//! operation, JSON results on stdout, logs on stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf2tables::api::{self, ApiError};
use pdf2tables::pipeline::input::load_input;
use pdf2tables::{
    AppState, ExtractionConfig, ExtractionResult, GeminiModel, LlmProviderModel, ServiceConfig,
    StructureRequest, VisionModel,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Per-page HTML tables, saved for later
  pdf2tables extract-html report.pdf > fragments.json

  # Structure a saved extraction (the JSON body of structure-data)
  pdf2tables structure-data request.json --csv-dir tables/

  # Both stages at once, from a URL
  pdf2tables extract https://example.com/annual-2023.pdf

  # Any edgequake-llm provider instead of the Gemini REST API
  pdf2tables --backend provider --provider openai --model gpt-4.1 extract report.pdf

ENVIRONMENT VARIABLES:
  GCP_SERVICE_ACCOUNT_KEY_PATH  Service-account key file (checked first)
  GCP_SERVICE_ACCOUNT_KEY_JSON  Service-account key as inline JSON
  GEMINI_API_KEY                Plain API key (fallback)
  GEMINI_MODEL                  Model ID, default gemini-2.0-flash-preview-image-generation
  ALLOWED_ORIGINS               Comma-separated origins, logged at startup
  PDFIUM_LIB_PATH               Path to libpdfium

EXIT CODES:
  0  success
  1  configuration or I/O error
  4  request rejected (unsupported file, no tables found)
  5  processing failed
"#;

/// Extract financial-report tables from PDFs with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tables",
    version,
    about = "Extract tables from PDF financial reports using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2TABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2TABLES_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterise a PDF and print every table as HTML, tagged by page.
    ExtractHtml {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
    /// Structure a `{htmlResults, documentName}` request into tables.
    StructureData {
        /// Request JSON file, or `-` for stdin.
        request: PathBuf,

        /// Also write one CSV file per table into this directory.
        #[arg(long, env = "PDF2TABLES_CSV_DIR")]
        csv_dir: Option<PathBuf>,
    },
    /// Run both stages on a PDF.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Also write one CSV file per table into this directory.
        #[arg(long, env = "PDF2TABLES_CSV_DIR")]
        csv_dir: Option<PathBuf>,
    },
    /// Report liveness and the configured model.
    Health,
    /// List models offered by the backend.
    Models,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Gemini REST API, credentials from the environment.
    Gemini,
    /// Any edgequake-llm provider.
    Provider,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Model backend.
    #[arg(long, global = true, env = "PDF2TABLES_BACKEND", value_enum, default_value = "gemini")]
    backend: Backend,

    /// edgequake-llm provider name (with `--backend provider`).
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER", default_value = "openai")]
    provider: String,

    /// Model ID. Overrides GEMINI_MODEL for the Gemini backend.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Page render scale (zoom factor).
    #[arg(long, global = true, env = "PDF2TABLES_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Sampling temperature for both stages.
    #[arg(long, global = true, env = "PDF2TABLES_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens of each per-page call.
    #[arg(long, global = true, env = "PDF2TABLES_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: u32,

    /// Give up on a page after this many seconds (default: wait indefinitely).
    #[arg(long, global = true, env = "PDF2TABLES_PAGE_TIMEOUT")]
    page_timeout: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PDF2TABLES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let state = AppState::new(build_model(&cli.model)?, build_config(&cli.pipeline)?);

    match cli.command {
        Command::ExtractHtml { input } => {
            let doc = load_input(&input, cli.pipeline.download_timeout)
                .await
                .context("Failed to load input")?;
            let fragments = exit_on_api_error(api::extract_html(&state, &doc.name, doc.bytes).await);
            print_json(&fragments)?;
            if !cli.quiet {
                eprintln!("{}  {} tables", green("✔"), fragments.len());
            }
        }
        Command::StructureData { request, csv_dir } => {
            let request = read_request(&request).await?;
            let result = exit_on_api_error(api::structure_data(&state, request).await);
            finish(&result, csv_dir.as_deref(), cli.quiet)?;
        }
        Command::Extract { input, csv_dir } => {
            let doc = load_input(&input, cli.pipeline.download_timeout)
                .await
                .context("Failed to load input")?;
            let result = exit_on_api_error(api::extract_tables(&state, &doc.name, doc.bytes).await);
            finish(&result, csv_dir.as_deref(), cli.quiet)?;
        }
        Command::Health => print_json(&api::health(&state))?,
        Command::Models => print_json(&api::list_models(&state).await)?,
    }

    Ok(())
}

fn build_model(args: &ModelArgs) -> Result<Arc<dyn VisionModel>> {
    match args.backend {
        Backend::Gemini => {
            let mut service = ServiceConfig::from_env().context("Startup configuration failed")?;
            if let Some(ref model) = args.model {
                service.model = model.clone();
            }
            let model = GeminiModel::from_config(&service).context("Failed to set up Gemini")?;
            Ok(Arc::new(model))
        }
        Backend::Provider => {
            let model_id = args
                .model
                .as_deref()
                .context("--model is required with --backend provider")?;
            let model = LlmProviderModel::from_factory(&args.provider, model_id)
                .context("Failed to set up LLM provider")?;
            Ok(Arc::new(model))
        }
    }
}

fn build_config(args: &PipelineArgs) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .render_scale(args.scale)
        .temperature(args.temperature)
        .html_max_output_tokens(args.max_tokens);
    if let Some(secs) = args.page_timeout {
        builder = builder.page_timeout_secs(secs);
    }
    builder.build().context("Invalid configuration")
}

async fn read_request(path: &Path) -> Result<StructureRequest> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request from {:?}", path))?
    };
    serde_json::from_str(&text).context("Request is not a valid {htmlResults, documentName} body")
}

/// Print the error body and exit with 4 (client error) or 5 (server error).
fn exit_on_api_error<T>(result: Result<T, ApiError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{}  {} {}", red("✘"), err.status_code(), err.message());
            if let Ok(body) = serde_json::to_string(&err.body()) {
                println!("{body}");
            }
            std::process::exit(if err.status_code() < 500 { 4 } else { 5 });
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn finish(result: &ExtractionResult, csv_dir: Option<&Path>, quiet: bool) -> Result<()> {
    print_json(result)?;
    if let Some(dir) = csv_dir {
        write_csv_files(result, dir)?;
    }
    if !quiet {
        eprintln!(
            "{}  {} tables  {}  {} / {}",
            green("✔"),
            result.tables.len(),
            bold(&result.document_name),
            result.metadata.currency,
            result.metadata.reporting_period,
        );
    }
    Ok(())
}

fn write_csv_files(result: &ExtractionResult, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    for (idx, table) in result.tables.iter().enumerate() {
        let path = dir.join(format!("table_{:02}_page_{}.csv", idx + 1, table.page_number));
        std::fs::write(&path, &table.csv).with_context(|| format!("Failed to write {:?}", path))?;
    }
    Ok(())
}
