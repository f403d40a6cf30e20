//! Prompt assembly and the streaming generation client.
//!
//! [`build_request`] lays out one user turn: system text, every page image
//! in order, the query delimiter, the optional attachment, and the question.
//! [`GenerativeModel`] is the seam between the chat session and the hosted
//! API; [`gemini::GeminiClient`] is the production implementation.

pub mod gemini;
pub mod types;

use crate::book::BookPageSet;
use crate::config::ChatConfig;
use crate::error::BookChatError;
use crate::pipeline::encode::PAGE_MIME_TYPE;
use crate::prompts;
use crate::transcript::ChatMessage;
use std::pin::Pin;
use tokio_stream::Stream;

pub use async_trait::async_trait;
pub use gemini::GeminiClient;
pub use types::{Content, GenerateContentRequest, GenerationConfig, InlineData, Part};

/// A lazy, finite, non-restartable stream of reply fragments.
///
/// Yields at most one `Err`, after which it ends.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BookChatError>> + Send>>;

/// A hosted model that answers a prompt with streamed text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Open a streaming request.
    ///
    /// # Errors
    /// Fails before any fragment when the request cannot be sent or the API
    /// rejects it; later failures arrive as the stream's final item.
    async fn stream_reply(
        &self,
        request: GenerateContentRequest,
    ) -> Result<FragmentStream, BookChatError>;
}

/// Build the request for `message` about the book in `pages`.
pub fn build_request(
    pages: &BookPageSet,
    message: &ChatMessage,
    config: &ChatConfig,
) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(pages.len() + 5);
    parts.push(Part::text(prompts::system_block(
        config.system_prompt.as_deref(),
    )));
    parts.extend(
        pages
            .pages()
            .iter()
            .map(|p| Part::image(PAGE_MIME_TYPE, p.data.clone())),
    );
    parts.push(Part::text(prompts::PAGES_END_QUERY_START));

    if let Some(image) = &message.image {
        parts.push(Part::image(image.mime_type(), image.base64_payload()));
    }
    parts.push(Part::text(prompts::question_text(
        &message.text,
        message.image.is_some(),
    )));
    parts.push(Part::text(prompts::QUERY_END));

    let generation = GenerationConfig {
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };

    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts,
        }],
        generation_config: (!generation.is_empty()).then_some(generation),
    }
}
