//! Prompt text for book-grounded chat.
//!
//! Every fixed string sent to the model lives here so the wording can be
//! inspected in tests without a live API. Callers can replace the system
//! instruction via [`crate::config::ChatConfig::system_prompt`]; the
//! delimiters are always added.

/// Default system instruction, sent before the page images.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an AI study assistant. Your goal is to help the user study the provided book.
Your primary and only source of knowledge is the set of book pages provided below.
First, you MUST detect the primary language used in the book pages (e.g., English, Nepali).
Then, you MUST respond to all user queries ONLY in that detected language.
It is very important that you do not assume the user's identity. Address them as 'you' or answer their questions directly.
Answer the user's questions strictly based on the content of these pages. If the answer is not in the book, state that clearly in the detected language."#;

/// Opens the block of page images.
pub const PAGES_START: &str = "\n\n---BOOK PAGES START---\n";

/// Closes the page images and opens the user's query.
pub const PAGES_END_QUERY_START: &str = "\n---BOOK PAGES END---\n\n---USER QUERY START---\n";

/// Closes the user's query.
pub const QUERY_END: &str = "\n---USER QUERY END---";

/// Inline notice appended to a reply whose stream failed.
pub const STREAM_FAILURE_NOTICE: &str = "Sorry, I ran into an error: Failed to get a response from the AI. Please check your API key and network connection.";

/// Shown when the user sends before any book is loaded.
pub const NO_BOOK_MESSAGE: &str = "Please upload or select a book before starting the chat.";

/// System text plus the page-block opener.
pub fn system_block(custom: Option<&str>) -> String {
    format!("{}{}", custom.unwrap_or(DEFAULT_SYSTEM_PROMPT), PAGES_START)
}

/// The question text, worded for whether an image precedes it.
pub fn question_text(question: &str, has_image: bool) -> String {
    if has_image {
        format!("\nUser's image is above. Here is the user's question about the image and book:\n{question}")
    } else {
        format!("Here is the user's question:\n{question}")
    }
}
