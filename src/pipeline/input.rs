//! Input resolution: turn a [`BookSource`] into PDF bytes in memory.
//!
//! Books are never written to disk. pdfium opens them straight from the
//! buffer, so both the download and the upload path end in a `Vec<u8>`
//! whose `%PDF` signature has already been checked.

use crate::catalog::BookSource;
use crate::error::BookChatError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Raw PDF bytes plus the name they were loaded under.
#[derive(Debug, Clone)]
pub struct PdfBytes {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch or read the PDF for `source`.
pub async fn resolve_source(
    source: &BookSource,
    timeout_secs: u64,
) -> Result<PdfBytes, BookChatError> {
    let name = source.display_name();
    let bytes = match source {
        BookSource::Catalog(entry) => download_url(entry.url, timeout_secs).await?,
        BookSource::Url(url) => download_url(url, timeout_secs).await?,
        BookSource::File(path) => read_local(path).await?,
    };
    check_magic(&name, &bytes)?;
    Ok(PdfBytes { name, bytes })
}

/// Read a user-chosen file, accepting only `.pdf`.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, BookChatError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(BookChatError::NotAPdfFile {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => BookChatError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BookChatError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Download a URL into memory.
pub async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, BookChatError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BookChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transport_error(url, timeout_secs, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BookChatError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(url, timeout_secs, e))?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

fn transport_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> BookChatError {
    if e.is_timeout() {
        BookChatError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        BookChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Verify the `%PDF` signature.
pub fn check_magic(name: &str, bytes: &[u8]) -> Result<(), BookChatError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(BookChatError::NotAPdf {
            source_name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}
