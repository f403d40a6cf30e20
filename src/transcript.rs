//! The chat transcript: an ordered, append-only list of turns.
//!
//! Only the final message can change after it is appended, and only while a
//! model reply is streaming into it. Updates address the last index
//! explicitly and check its role first, so a fragment can never land in a
//! user turn.

use crate::attachment::ImageAttachment;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl ChatMessage {
    /// A user turn, optionally carrying an image.
    pub fn user(text: impl Into<String>, image: Option<ImageAttachment>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image,
        }
    }

    /// A model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            image: None,
        }
    }
}

/// Greeting placed at the top of a fresh transcript.
pub fn seed_greeting(page_count: usize) -> String {
    format!(
        "I've finished reading the book with {page_count} pages. Ask me anything about its content!"
    )
}

/// Ordered conversation history for the active book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript holding only the greeting for a book of `page_count` pages.
    pub fn seeded(page_count: usize) -> Self {
        Self {
            messages: vec![ChatMessage::model(seed_greeting(page_count))],
        }
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Concatenate `fragment` onto the last message if it is a model turn.
    ///
    /// Returns `false` (and changes nothing) when the transcript is empty or
    /// the last turn belongs to the user.
    pub fn append_stream_fragment(&mut self, fragment: &str) -> bool {
        match self.last_model_mut() {
            Some(message) => {
                message.text.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Append an inline failure note to the last model turn, keeping any
    /// text that already streamed in.
    pub fn annotate_failure(&mut self, notice: &str) -> bool {
        match self.last_model_mut() {
            Some(message) => {
                if !message.text.is_empty() {
                    message.text.push_str("\n\n");
                }
                message.text.push_str(notice);
                true
            }
            None => false,
        }
    }

    /// Replace the whole history with a single seed message.
    pub fn reset(&mut self, seed: ChatMessage) {
        self.messages.clear();
        self.messages.push(seed);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn last_model_mut(&mut self) -> Option<&mut ChatMessage> {
        let idx = self.messages.len().checked_sub(1)?;
        let message = &mut self.messages[idx];
        (message.role == Role::Model).then_some(message)
    }
}
