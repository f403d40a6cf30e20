//! Streaming client for Gemini's `streamGenerateContent` endpoint.
//!
//! The request asks for `alt=sse`, so the body arrives as server-sent
//! events, each carrying one JSON response chunk. Chunks are decoded as they
//! arrive and their text is yielded verbatim; nothing is buffered beyond one
//! event.

use super::types::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse};
use super::{async_trait, FragmentStream, GenerativeModel};
use crate::config::ChatConfig;
use crate::error::BookChatError;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;
use tokio_stream::Stream;
use tracing::{debug, error, info, trace};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client bound to one model and credential.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    idle_timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &ChatConfig) -> Result<Self, BookChatError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BookChatError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            idle_timeout: Duration::from_secs(config.api_timeout_secs),
        })
    }

    /// Full streaming endpoint URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream_reply(
        &self,
        request: GenerateContentRequest,
    ) -> Result<FragmentStream, BookChatError> {
        let images = request.inline_images().count();
        info!("Requesting reply from {} with {} images", self.name(), images);

        let send = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send();

        // The idle bound also covers the wait for response headers.
        let response = timeout(self.idle_timeout, send)
            .await
            .map_err(|_| BookChatError::StreamTimeout {
                secs: self.idle_timeout.as_secs(),
            })?
            .map_err(|e| BookChatError::StreamFailed {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match timeout(self.idle_timeout, response.text()).await {
                Ok(Ok(body)) => body,
                _ => String::new(),
            };
            let message = api_error_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            });
            error!("Generation API returned {}: {}", status, message);
            return Err(BookChatError::ApiStatus {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Stream opened ({})", status);
        Ok(fragment_stream(
            response.bytes_stream().eventsource(),
            self.idle_timeout,
        ))
    }
}

/// Extract the `error.message` of a JSON error body.
pub fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|env| env.error.describe())
}

/// Decode one SSE payload into the text it carries.
///
/// `Ok(None)` for keep-alives and chunks without visible text.
pub fn decode_event(data: &str) -> Result<Option<String>, BookChatError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: GenerateContentResponse =
        serde_json::from_str(data).map_err(|e| BookChatError::StreamFailed {
            detail: format!("malformed event: {e}"),
        })?;

    if let Some(err) = &chunk.error {
        return Err(BookChatError::StreamFailed {
            detail: err.describe(),
        });
    }
    if let Some(reason) = chunk.block_reason() {
        return Err(BookChatError::StreamFailed {
            detail: format!("request blocked: {reason}"),
        });
    }
    if let Some(reason) = chunk
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
    {
        debug!("Finish reason: {}", reason);
    }

    let text = chunk.text();
    Ok((!text.is_empty()).then_some(text))
}

type EventStream<E> = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<E>>> + Send>>;

struct FragmentState<E> {
    events: EventStream<E>,
    idle: Duration,
    done: bool,
}

/// Turn parsed SSE events into a fragment stream that ends after the first
/// error.
pub(crate) fn fragment_stream<S, E>(events: S, idle: Duration) -> FragmentStream
where
    S: Stream<Item = Result<Event, EventStreamError<E>>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = FragmentState {
        events: Box::pin(events),
        idle,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            let next = match timeout(st.idle, st.events.next()).await {
                Ok(next) => next,
                Err(_) => {
                    st.done = true;
                    let secs = st.idle.as_secs();
                    return Some((Err(BookChatError::StreamTimeout { secs }), st));
                }
            };

            let event = match next {
                None => return None,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    st.done = true;
                    let detail = e.to_string();
                    return Some((Err(BookChatError::StreamFailed { detail }), st));
                }
            };

            trace!("SSE event: {:?}", event.data);
            match decode_event(&event.data) {
                Ok(Some(text)) => return Some((Ok(text), st)),
                Ok(None) => continue,
                Err(e) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })
        )
    }

    fn sse(chunks: Vec<String>) -> FragmentStream {
        let bytes = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        fragment_stream(bytes.eventsource(), Duration::from_secs(5))
    }

    #[test]
    fn decode_skips_keepalive() {
        assert_eq!(decode_event("").unwrap(), None);
        assert_eq!(decode_event("[DONE]").unwrap(), None);
    }

    #[test]
    fn decode_reports_stream_error_object() {
        let err = decode_event(r#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("INTERNAL: internal"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_event("{not json"),
            Err(BookChatError::StreamFailed { .. })
        ));
    }

    #[test]
    fn api_error_message_parses_envelope() {
        let body = r#"{"error":{"code":403,"message":"API key not valid.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            api_error_message(body).as_deref(),
            Some("PERMISSION_DENIED: API key not valid.")
        );
        assert_eq!(api_error_message("<html>"), None);
    }

    #[tokio::test]
    async fn fragments_arrive_in_order() {
        let s = sse(vec![
            chunk("Chapter"),
            chunk("1 is about..."),
            chunk("the solar system."),
        ]);
        let got: Vec<String> = s.map(|r| r.unwrap()).collect().await;
        assert_eq!(got, vec!["Chapter", "1 is about...", "the solar system."]);
    }

    #[tokio::test]
    async fn stream_ends_after_first_error() {
        let s = sse(vec![
            chunk("Partial"),
            "data: {\"error\":{\"message\":\"quota\"}}\n\n".to_string(),
            chunk("never seen"),
        ]);
        let items: Vec<Result<String, BookChatError>> = s.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Partial");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn idle_timeout_fails_stream() {
        let never = stream::pending::<Result<&'static str, std::io::Error>>();
        let mut s = fragment_stream(never.eventsource(), Duration::from_millis(20));
        let first = s.next().await.unwrap();
        assert!(matches!(first, Err(BookChatError::StreamTimeout { .. })));
        assert!(s.next().await.is_none());
    }

    #[test]
    fn endpoint_includes_model_and_sse() {
        let cfg = ChatConfig::builder()
            .api_key("k")
            .api_base_url("http://127.0.0.1:1")
            .model("gemini-test")
            .build()
            .unwrap();
        let client = GeminiClient::new(&cfg).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:1/v1beta/models/gemini-test:streamGenerateContent?alt=sse"
        );
        assert!(!format!("{client:?}").contains("\"k\""));
    }
}
