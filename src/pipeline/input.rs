//! Input resolution: load a user-supplied path or URL into memory.
//!
//! Extraction works on bytes (pdfium reads straight from a slice), so a URL
//! is downloaded into memory rather than to a temp file, and a local path is
//! read whole. No content check happens here: the `%PDF` check belongs to
//! extraction, which has to make it for uploads too.

use crate::error::TraceError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A document loaded from a path or URL.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// File name used for display and in API responses.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input string as a document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, TraceError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(TraceError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<LoadedInput, TraceError> {
    let path: PathBuf = path.to_path_buf();
    if !path.exists() {
        return Err(TraceError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(TraceError::InvalidInput {
            input: path.display().to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TraceError::PermissionDenied { path });
        }
        Err(_) => return Err(TraceError::FileNotFound { path }),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    debug!("Read local file {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedInput { filename, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedInput, TraceError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TraceError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failure = |e: reqwest::Error| {
        if e.is_timeout() {
            TraceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            TraceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(timeout_or_failure)?;

    if !response.status().is_success() {
        return Err(TraceError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(timeout_or_failure)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(LoadedInput {
        filename: filename_from_url(url),
        bytes: bytes.to_vec(),
    })
}

/// Last path segment of a URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
