//! Error types for the bookchat library.
//!
//! A single [`BookChatError`] enum covers every failure, grouped by where it
//! can happen. [`BookChatError::category`] folds the variants into the four
//! kinds the application distinguishes:
//!
//! * [`ErrorCategory::StartupConfig`]: **fatal**, the credential is missing
//!   or the configuration is invalid. The binary refuses to start.
//!
//! * [`ErrorCategory::BookFetch`]: the PDF could not be downloaded or read,
//!   or it is not a PDF. The previously loaded book stays active.
//!
//! * [`ErrorCategory::Render`]: pdfium could not open or rasterise a page.
//!   The whole load is aborted; no partial book is ever swapped in.
//!
//! * [`ErrorCategory::Stream`]: the generation request failed before or
//!   during streaming. Text already streamed stays in the transcript and the
//!   user may simply send again.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the bookchat library.
#[derive(Debug, Error)]
pub enum BookChatError {
    // ── Startup / config errors ───────────────────────────────────────────
    /// No API key in the process environment.
    #[error(
        "API_KEY environment variable is not set.\n\
Export your Gemini API key first: export API_KEY=... (GEMINI_API_KEY is also accepted)"
    )]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed (TLS backend, proxy settings).
    #[error("Failed to initialise the HTTP client: {0}")]
    HttpClient(String),

    // ── Book fetch errors ─────────────────────────────────────────────────
    /// The name or number does not match any catalog entry.
    #[error("Unknown book '{query}'. Use /books to list the available titles.")]
    UnknownBook { query: String },

    /// The request could not be sent or the body could not be read.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error(
        "Failed to download book: {reason} (status: {status}). \
Check if the URL is correct and the repository is public."
    )]
    HttpStatus {
        url: String,
        status: u16,
        reason: String,
    },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Local file was not found.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The chosen file does not carry a `.pdf` extension.
    #[error("Invalid file type. Please upload a PDF file.")]
    NotAPdfFile { path: PathBuf },

    /// The bytes do not start with the `%PDF` signature.
    #[error("'{source_name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place the pdfium shared library next to the executable or in the current\n\
directory, install it system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
Prebuilt binaries: https://github.com/bblanchon/pdfium-binaries"
    )]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' is corrupt: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// The document opened but has no pages.
    #[error("PDF '{source_name}' has no pages")]
    EmptyDocument { source_name: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The rendered bitmap could not be encoded as JPEG.
    #[error("Image encoding failed for page {page}: {detail}")]
    EncodingFailed { page: usize, detail: String },

    // ── Stream errors ─────────────────────────────────────────────────────
    /// The generation API answered with a non-success status.
    #[error("Generation API returned HTTP {status}: {message}")]
    ApiStatus { status: u16, message: String },

    /// Transport, framing, or API error while the reply was streaming.
    #[error("Streaming failed: {detail}")]
    StreamFailed { detail: String },

    /// No event arrived within the idle timeout.
    #[error("No data from the generation API for {secs}s")]
    StreamTimeout { secs: u64 },

    /// Attachment is not a PNG or JPEG image.
    #[error("Unsupported attachment '{path}': only PNG and JPEG images can be attached")]
    UnsupportedAttachment { path: PathBuf },

    /// Attachment could not be read from disk.
    #[error("Failed to read attachment '{path}': {source}")]
    AttachmentUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The four kinds of failure the application reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal at startup.
    StartupConfig,
    /// Recoverable; prior book preserved.
    BookFetch,
    /// Recoverable; current load aborted.
    Render,
    /// Recoverable; partial reply kept and annotated.
    Stream,
}

impl BookChatError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        use BookChatError::*;
        match self {
            MissingApiKey | InvalidConfig(_) | HttpClient(_) => ErrorCategory::StartupConfig,
            UnknownBook { .. }
            | DownloadFailed { .. }
            | HttpStatus { .. }
            | DownloadTimeout { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | NotAPdfFile { .. }
            | NotAPdf { .. } => ErrorCategory::BookFetch,
            PdfiumBindingFailed(_)
            | CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | EmptyDocument { .. }
            | RasterisationFailed { .. }
            | EncodingFailed { .. }
            | Internal(_) => ErrorCategory::Render,
            ApiStatus { .. }
            | StreamFailed { .. }
            | StreamTimeout { .. }
            | UnsupportedAttachment { .. }
            | AttachmentUnreadable { .. } => ErrorCategory::Stream,
        }
    }

    /// `true` when the application cannot continue.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::StartupConfig
    }
}
