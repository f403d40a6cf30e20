//! The chat session: application state plus the user intents that change it.
//!
//! A [`ChatSession`] owns the only mutable state in the application: the
//! active book, the transcript, the panel flag, and the [`AppState`] tag the
//! presentation layer renders. Every intent is an `async` method returning a
//! result; recoverable failures are converted to a user-facing message here
//! and never propagate further.
//!
//! Overlapping work is rejected rather than queued: a send or load requested
//! while another is in flight returns [`SendOutcome::Busy`] /
//! [`LoadOutcome::Busy`] and changes nothing.

use crate::attachment::ImageAttachment;
use crate::book::{self, LoadedBook};
use crate::catalog::BookSource;
use crate::config::ChatConfig;
use crate::error::BookChatError;
use crate::llm::{self, GenerativeModel};
use crate::progress::{ProgressCallback, ReplyObserver};
use crate::prompts::{NO_BOOK_MESSAGE, STREAM_FAILURE_NOTICE};
use crate::transcript::{seed_greeting, ChatMessage, Transcript};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the application is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// No book loaded and nothing in flight.
    Idle,
    /// A book is being fetched and rasterised.
    LoadingBook { source: String },
    /// A book is loaded; ready for questions.
    Ready,
    /// A reply is streaming into the transcript.
    Streaming,
    /// The last intent failed; `message` is shown to the user.
    Error { message: String },
}

impl AppState {
    /// `true` while a load or stream is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, AppState::LoadingBook { .. } | AppState::Streaming)
    }
}

/// Result of [`ChatSession::load_book`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The book replaced any previous one.
    Loaded { name: String, pages: usize },
    /// The load failed; the previous book (if any) is still active.
    Failed { message: String },
    /// Another load or stream was in flight; nothing happened.
    Busy,
}

/// Result of [`ChatSession::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply streamed to completion.
    Completed,
    /// The reply failed part-way; the transcript carries a failure notice.
    Failed { message: String },
    /// No book is loaded; no request was made.
    NoBook,
    /// Neither text nor image was given.
    Empty,
    /// Another load or stream was in flight; nothing happened.
    Busy,
}

/// A single user's conversation about one book at a time.
pub struct ChatSession {
    config: ChatConfig,
    model: Arc<dyn GenerativeModel>,
    book: Option<LoadedBook>,
    transcript: Transcript,
    state: AppState,
    panel_open: bool,
}

impl ChatSession {
    /// A session with no book, talking to `model`.
    pub fn new(config: ChatConfig, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            config,
            model,
            book: None,
            transcript: Transcript::new(),
            state: AppState::Idle,
            panel_open: false,
        }
    }

    /// A session backed by the Gemini client built from `config`.
    pub fn with_gemini(config: ChatConfig) -> Result<Self, BookChatError> {
        let client = llm::GeminiClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn book(&self) -> Option<&LoadedBook> {
        self.book.as_ref()
    }

    /// `true` when a non-empty page set is active.
    pub fn has_book(&self) -> bool {
        self.book.as_ref().is_some_and(|b| !b.pages.is_empty())
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Show or hide the book panel.
    pub fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    /// Message to show for the current state, if any.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            AppState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Load `source` and make it the active book.
    ///
    /// On success the transcript restarts with a greeting naming the page
    /// count and the panel closes. On failure the previous book and
    /// transcript are untouched.
    pub async fn load_book(
        &mut self,
        source: &BookSource,
        progress: ProgressCallback,
    ) -> LoadOutcome {
        if self.state.is_busy() {
            warn!("Ignoring load of '{}': busy", source);
            return LoadOutcome::Busy;
        }

        let name = source.display_name();
        self.state = AppState::LoadingBook { source: name.clone() };

        match book::load_book(source, &self.config, progress).await {
            Ok(loaded) => {
                let pages = loaded.page_count();
                info!("Active book is now '{}' ({} pages)", loaded.name, pages);
                self.install_book(loaded);
                LoadOutcome::Loaded { name, pages }
            }
            Err(e) => {
                error!("Failed to load '{}': {}", name, e);
                let message = if source.is_upload() {
                    format!("Failed to process file. {e}")
                } else {
                    format!("Failed to load \"{name}\". {e}")
                };
                self.state = AppState::Error {
                    message: message.clone(),
                };
                LoadOutcome::Failed { message }
            }
        }
    }

    /// Make `book` the active book, replacing any previous one entirely.
    pub fn install_book(&mut self, book: LoadedBook) {
        let pages = book.page_count();
        self.book = Some(book);
        self.transcript.reset(ChatMessage::model(seed_greeting(pages)));
        self.state = AppState::Ready;
        self.panel_open = false;
    }

    /// Ask the model about the active book.
    ///
    /// Appends the user turn and an empty model turn, then applies each
    /// fragment to the model turn in arrival order. A failed stream keeps
    /// the text received so far and appends a failure notice.
    pub async fn send_message(
        &mut self,
        text: &str,
        image: Option<ImageAttachment>,
        observer: &mut dyn ReplyObserver,
    ) -> SendOutcome {
        if self.state.is_busy() {
            warn!("Ignoring send: a request is already in flight");
            return SendOutcome::Busy;
        }

        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return SendOutcome::Empty;
        }

        let Some(book) = self.book.as_ref().filter(|b| !b.pages.is_empty()) else {
            self.state = AppState::Error {
                message: NO_BOOK_MESSAGE.to_string(),
            };
            self.panel_open = true;
            return SendOutcome::NoBook;
        };

        let user_message = ChatMessage::user(text, image);
        let request = llm::build_request(&book.pages, &user_message, &self.config);

        self.state = AppState::Streaming;
        self.transcript.append(user_message);
        self.transcript.append(ChatMessage::model(""));

        let result = self.stream_into_transcript(request, observer).await;

        match result {
            Ok(fragments) => {
                info!("Reply complete: {} fragments", fragments);
                self.state = AppState::Ready;
                SendOutcome::Completed
            }
            Err(e) => {
                error!("Error streaming chat response: {}", e);
                self.transcript.annotate_failure(STREAM_FAILURE_NOTICE);
                observer.on_failure(STREAM_FAILURE_NOTICE);
                self.state = AppState::Ready;
                SendOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn stream_into_transcript(
        &mut self,
        request: llm::GenerateContentRequest,
        observer: &mut dyn ReplyObserver,
    ) -> Result<usize, BookChatError> {
        let mut stream = self.model.stream_reply(request).await?;
        let mut count = 0;

        while let Some(item) = stream.next().await {
            let fragment = item?;
            if self.transcript.append_stream_fragment(&fragment) {
                observer.on_fragment(&fragment);
                count += 1;
            }
        }
        Ok(count)
    }
}
