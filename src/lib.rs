//! # bookchat
//!
//! Chat with a PDF book through a multimodal LLM.
//!
//! ## Why this crate?
//!
//! Textbooks are full of figures, maps, formulae and scripts that text
//! extraction mangles or drops. Instead this crate rasterises every page into
//! a JPEG and sends the whole book, page images in order, together with the
//! user's question to a vision-capable model. The reply streams back into a
//! transcript fragment by fragment.
//!
//! ## Pipeline Overview
//!
//! ```text
//! BookSource (catalog entry | URL | local file)
//!  │
//!  ├─ 1. Input    fetch or read bytes, check the %PDF magic
//!  ├─ 2. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode   RGB → JPEG → base64 PageImage
//!  ├─ 4. Prompt   system text + every page + delimiter + question
//!  ├─ 5. Stream   Gemini streamGenerateContent over SSE
//!  └─ 6. Session  fragments appended to the last model turn
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookchat::{BookSource, ChatConfig, ChatSession, CollectReply, NoopProgress};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from API_KEY or GEMINI_API_KEY
//!     let config = ChatConfig::from_env()?;
//!     let mut session = ChatSession::with_gemini(config)?;
//!
//!     session.load_book(&BookSource::parse("1"), Arc::new(NoopProgress)).await;
//!
//!     let mut reply = CollectReply::default();
//!     session.send_message("What is chapter 1 about?", None, &mut reply).await;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bookchat` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bookchat = { version = "0.1", default-features = false }
//! ```
//!
//! ## Payload size
//!
//! Every question resends every page. A 200-page book at the default scale is
//! tens of megabytes of base64 per request; lower `render_scale` or
//! `jpeg_quality` for long books.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod attachment;
pub mod book;
pub mod catalog;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod transcript;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use attachment::ImageAttachment;
pub use book::{load_book, BookPageSet, LoadedBook};
pub use catalog::{BookSource, CatalogEntry, CATALOG};
pub use config::{ChatConfig, ChatConfigBuilder};
pub use error::{BookChatError, ErrorCategory};
pub use llm::{build_request, FragmentStream, GeminiClient, GenerativeModel};
pub use pipeline::encode::PageImage;
pub use progress::{
    BookLoadProgress, CollectReply, NoopProgress, ProgressCallback, ReplyObserver, UploadProgress,
};
pub use session::{AppState, ChatSession, LoadOutcome, SendOutcome};
pub use transcript::{ChatMessage, Role, Transcript};
