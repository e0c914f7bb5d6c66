//! Input resolution: a user-supplied path or URL → document name + bytes.
//!
//! pdfium loads straight from a byte buffer, so downloads stay in memory.
//! No content sniffing happens here; a buffer that is not a PDF surfaces as
//! a parse error from the rasteriser.

use crate::error::Pdf2TablesError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A document ready for the pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// File name as supplied by the caller; checked for a `.pdf` extension.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, Pdf2TablesError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(Pdf2TablesError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<LoadedDocument, Pdf2TablesError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2TablesError::FileNotFound {
            path: PathBuf::from(path),
        },
        _ => Pdf2TablesError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Loaded local document '{}' ({} bytes)", name, bytes.len());
    Ok(LoadedDocument { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, Pdf2TablesError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2TablesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let to_error = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2TablesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2TablesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(to_error)?;
    if !response.status().is_success() {
        return Err(Pdf2TablesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(to_error)?;
    let name = filename_from_url(url);
    info!("Downloaded '{}' ({} bytes)", name, bytes.len());

    Ok(LoadedDocument {
        name,
        bytes: bytes.to_vec(),
    })
}

/// Last path segment of `url` when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(String::from))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
