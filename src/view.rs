//! Presentation: plain-text rendering of session state.
//!
//! Every function here is a pure function of its arguments. The binary
//! decides where the text goes and how it is coloured.

use crate::book::LoadedBook;
use crate::catalog::{CatalogEntry, CATALOG};
use crate::progress::UploadProgress;
use crate::session::{AppState, ChatSession};
use crate::transcript::{ChatMessage, Role, Transcript};

/// Label shown before user turns.
pub const USER_LABEL: &str = "you";
/// Label shown before model turns.
pub const MODEL_LABEL: &str = "tutor";

/// Header line that opens a turn.
pub fn turn_header(role: Role) -> String {
    match role {
        Role::User => format!("{USER_LABEL} ▸"),
        Role::Model => format!("{MODEL_LABEL} ▸"),
    }
}

/// One turn, header then text, with a marker for an attached image.
pub fn render_message(message: &ChatMessage) -> String {
    let mut out = turn_header(message.role);
    if let Some(image) = &message.image {
        out.push_str(&format!(
            "\n[{} attached, {} KiB]",
            image.mime_type(),
            image.approx_size().div_ceil(1024)
        ));
    }
    out.push('\n');
    out.push_str(&message.text);
    out
}

/// The whole conversation, turns separated by a blank line.
pub fn render_transcript(transcript: &Transcript) -> String {
    transcript
        .messages()
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Status line for `state`, or `None` when there is nothing to say.
pub fn render_status(state: &AppState) -> Option<String> {
    match state {
        AppState::Idle => Some("No book loaded. Use /books to pick one or /open <file.pdf>.".into()),
        AppState::LoadingBook { source } => Some(format!("Loading \"{source}\"...")),
        AppState::Ready => None,
        AppState::Streaming => Some("Thinking...".into()),
        AppState::Error { message } => Some(message.clone()),
    }
}

/// Rasterisation progress line.
pub fn render_progress(progress: UploadProgress) -> String {
    if progress.is_counted() {
        format!(
            "Converting page {} of {}...",
            progress.current, progress.total
        )
    } else {
        "Opening PDF...".to_string()
    }
}

/// One-line summary of the active book.
pub fn render_book_summary(book: &LoadedBook) -> String {
    format!("{}: {} pages loaded.", book.name, book.page_count())
}

/// The book panel: catalog, upload hint, and the active book.
///
/// `None` while the panel is closed.
pub fn render_panel(
    catalog: &[CatalogEntry],
    book: Option<&LoadedBook>,
    state: &AppState,
    panel_open: bool,
) -> Option<String> {
    if !panel_open {
        return None;
    }

    let mut out = String::from("Select a Provided Book\n");
    for (i, entry) in catalog.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, entry.title));
    }
    out.push_str("  → /load <number|title>\n\n");
    out.push_str("Or Upload a Custom Book\n");
    out.push_str("  → /open <path/to/book.pdf | https://...>\n");

    match (book, state) {
        (_, AppState::LoadingBook { source }) => {
            out.push_str(&format!("\nProcessing \"{source}\"...\n"));
        }
        (Some(b), _) => {
            out.push_str(&format!("\n{}\n", render_book_summary(b)));
        }
        (None, _) => {}
    }
    Some(out)
}

/// Placeholder text for the input prompt.
pub fn input_hint(state: &AppState, has_book: bool) -> &'static str {
    if state.is_busy() {
        "Please wait..."
    } else if !has_book {
        "Please upload a book to begin."
    } else {
        "Type your message or /attach an image..."
    }
}

/// Whether a message may be sent right now.
pub fn send_enabled(state: &AppState, has_book: bool) -> bool {
    match state {
        AppState::LoadingBook { .. } | AppState::Streaming => false,
        AppState::Idle | AppState::Ready | AppState::Error { .. } => has_book,
    }
}

/// Full screen for a session: panel, transcript, status.
pub fn render_session(session: &ChatSession) -> String {
    let mut sections = Vec::new();
    if let Some(panel) = render_panel(
        CATALOG,
        session.book(),
        session.state(),
        session.panel_open(),
    ) {
        sections.push(panel);
    }
    if !session.transcript().is_empty() {
        sections.push(render_transcript(session.transcript()));
    }
    if let Some(status) = render_status(session.state()) {
        sections.push(status);
    }
    sections.join("\n\n")
}
