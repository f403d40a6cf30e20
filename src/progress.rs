//! Callback traits for book-load progress and streamed replies.
//!
//! Inject an [`Arc<dyn BookLoadProgress>`] into
//! [`crate::session::ChatSession::load_book`] to receive events while a book
//! is downloaded and rasterised, and a [`ReplyObserver`] into
//! [`crate::session::ChatSession::send_message`] to see each fragment as it
//! arrives.
//!
//! # Example
//!
//! ```rust
//! use bookchat::BookLoadProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BookLoadProgress for Counter {
//!     fn on_page_rendered(&self, current: usize, total: usize) {
//!         self.0.store(current, Ordering::SeqCst);
//!         eprintln!("Converting page {current} of {total}...");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Transient `(current, total)` pair valid only while a book rasterises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub current: usize,
    pub total: usize,
}

impl UploadProgress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// `true` once the page count is known.
    pub fn is_counted(&self) -> bool {
        self.total > 0
    }
}

/// Called while a book is loaded.
///
/// Rendering runs on a blocking thread, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait BookLoadProgress: Send + Sync {
    /// Called before the PDF is fetched or read.
    fn on_load_start(&self, name: &str) {
        let _ = name;
    }

    /// Called once the document is open and its page count is known.
    fn on_pages_counted(&self, total: usize) {
        let _ = total;
    }

    /// Called after each page is rendered and encoded.
    ///
    /// `current` is 1-based and strictly increasing.
    fn on_page_rendered(&self, current: usize, total: usize) {
        let _ = (current, total);
    }

    /// Called after every page succeeded.
    fn on_load_complete(&self, total: usize) {
        let _ = total;
    }
}

/// Called while a model reply streams in.
pub trait ReplyObserver {
    /// Called once per fragment, in arrival order, after it was applied to
    /// the transcript.
    fn on_fragment(&mut self, fragment: &str) {
        let _ = fragment;
    }

    /// Called once if the stream fails, with the notice appended to the
    /// transcript.
    fn on_failure(&mut self, notice: &str) {
        let _ = notice;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl BookLoadProgress for NoopProgress {}

impl ReplyObserver for NoopProgress {}

/// Collects fragments into a `String`; handy for non-interactive callers.
#[derive(Debug, Default)]
pub struct CollectReply {
    pub text: String,
    pub failure: Option<String>,
}

impl ReplyObserver for CollectReply {
    fn on_fragment(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    fn on_failure(&mut self, notice: &str) {
        self.failure = Some(notice.to_string());
    }
}

/// Convenience alias for a shared progress callback.
pub type ProgressCallback = Arc<dyn BookLoadProgress>;
