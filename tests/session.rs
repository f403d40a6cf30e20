//! Integration tests for book fetching and reply streaming.
//!
//! A loopback `tokio::net::TcpListener` stands in for both the PDF host and
//! the generation API, so these run offline and need no pdfium library.
//!
//! Run with:
//!   cargo test --test session -- --nocapture

use bookchat::prompts::STREAM_FAILURE_NOTICE;
use bookchat::{
    AppState, BookChatError, BookPageSet, BookSource, ChatConfig, ChatSession, CollectReply,
    LoadOutcome, LoadedBook, NoopProgress, PageImage, Role, SendOutcome,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Loopback server ──────────────────────────────────────────────────────────

/// One request as the server saw it.
#[derive(Debug, Clone)]
struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

/// Canned response written to every connection.
#[derive(Clone)]
struct Canned {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Canned {
    fn new(status: &'static str, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }
}

/// Serve `canned` to every connection; returns the base URL and a log of
/// requests.
async fn serve(canned: Canned) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let canned = canned.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                seen.lock().unwrap().push(request);

                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    canned.status,
                    canned.content_type,
                    canned.body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&canned.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), log)
}

/// Accept connections and read the request, but never answer.
async fn serve_silent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = read_request(&mut socket).await;
            held.push(socket);
        }
    });

    format!("http://{addr}")
}

/// Read headers, then exactly `Content-Length` body bytes.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(Captured {
        head,
        body: buf[body_start..].to_vec(),
    })
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn config(base_url: &str) -> ChatConfig {
    ChatConfig::builder()
        .api_key("test-key")
        .api_base_url(base_url)
        .model("gemini-test")
        .download_timeout_secs(5)
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

fn book(name: &str, pages: usize) -> LoadedBook {
    LoadedBook {
        name: name.to_string(),
        pages: BookPageSet::new(
            (1..=pages)
                .map(|i| PageImage {
                    page_num: i,
                    width: 8,
                    height: 8,
                    data: format!("cGFnZS0{i}"),
                })
                .collect(),
        ),
    }
}

fn sse_chunk(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    )
}

// ── Book fetching ────────────────────────────────────────────────────────────

#[tokio::test]
async fn http_404_fails_load_and_leaves_no_book() {
    init_logging();
    let (base, _) = serve(Canned::new("404 Not Found", "text/plain", "nope")).await;
    let mut session = ChatSession::with_gemini(config(&base)).unwrap();

    let source = BookSource::parse(&format!("{base}/books/missing.pdf"));
    let outcome = session.load_book(&source, Arc::new(NoopProgress)).await;

    let LoadOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.starts_with("Failed to load \"missing.pdf\"."), "{message}");
    assert!(message.contains("404"), "{message}");
    assert!(session.book().is_none());
    assert!(!session.has_book());
    assert_eq!(
        session.state(),
        &AppState::Error {
            message: message.clone()
        }
    );
}

#[tokio::test]
async fn failed_load_keeps_previous_book_and_transcript() {
    let (base, _) = serve(Canned::new("500 Internal Server Error", "text/plain", "")).await;
    let mut session = ChatSession::with_gemini(config(&base)).unwrap();
    session.install_book(book("Physics", 4));
    let before = session.transcript().clone();

    let source = BookSource::parse(&format!("{base}/other.pdf"));
    let outcome = session.load_book(&source, Arc::new(NoopProgress)).await;

    assert!(matches!(outcome, LoadOutcome::Failed { .. }));
    assert_eq!(session.book().map(|b| b.name.as_str()), Some("Physics"));
    assert_eq!(session.transcript(), &before);
}

#[tokio::test]
async fn non_pdf_body_is_rejected_before_rendering() {
    let (base, _) = serve(Canned::new("200 OK", "text/html", "<html>hi</html>")).await;
    let source = BookSource::parse(&format!("{base}/page.pdf"));
    let cfg = config(&base);

    let err = bookchat::load_book(&source, &cfg, Arc::new(NoopProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, BookChatError::NotAPdf { .. }), "{err:?}");
}

// ── Reply streaming ──────────────────────────────────────────────────────────

#[tokio::test]
async fn streamed_reply_concatenates_into_last_model_turn() {
    init_logging();
    let body = [
        sse_chunk("Chapter"),
        sse_chunk("1 is about..."),
        sse_chunk("the solar system."),
    ]
    .concat();
    let (base, log) = serve(Canned::new("200 OK", "text/event-stream", body)).await;

    let mut session = ChatSession::with_gemini(config(&base)).unwrap();
    session.install_book(book("Science", 3));

    let mut reply = CollectReply::default();
    let outcome = session
        .send_message("What is chapter 1 about?", None, &mut reply)
        .await;

    assert_eq!(outcome, SendOutcome::Completed);
    assert_eq!(reply.text, "Chapter1 is about...the solar system.");
    assert!(reply.failure.is_none());

    let messages = session.transcript().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].text, "What is chapter 1 about?");
    assert_eq!(messages[2].role, Role::Model);
    assert_eq!(messages[2].text, "Chapter1 is about...the solar system.");
    assert_eq!(session.state(), &AppState::Ready);

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert!(req
        .head
        .starts_with("POST /v1beta/models/gemini-test:streamGenerateContent?alt=sse "));
    assert_eq!(req.header("x-goog-api-key"), Some("test-key"));

    let json = req.json();
    let parts = json["contents"][0]["parts"].as_array().unwrap();
    let images: Vec<&str> = parts
        .iter()
        .filter_map(|p| p["inlineData"]["data"].as_str())
        .collect();
    assert_eq!(images, vec!["cGFnZS01", "cGFnZS02", "cGFnZS03"]);
    assert!(parts
        .iter()
        .all(|p| p.get("inlineData").is_none() || p["inlineData"]["mimeType"] == "image/jpeg"));
}

#[tokio::test]
async fn api_error_status_appends_failure_notice() {
    let body = r#"{"error":{"code":403,"message":"API key not valid.","status":"PERMISSION_DENIED"}}"#;
    let (base, _) = serve(Canned::new("403 Forbidden", "application/json", body)).await;

    let mut session = ChatSession::with_gemini(config(&base)).unwrap();
    session.install_book(book("Science", 1));

    let mut reply = CollectReply::default();
    let outcome = session.send_message("hello", None, &mut reply).await;

    let SendOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("403"), "{message}");
    assert!(message.contains("API key not valid."), "{message}");
    assert_eq!(reply.failure.as_deref(), Some(STREAM_FAILURE_NOTICE));

    let last = session.transcript().last().unwrap();
    assert_eq!(last.role, Role::Model);
    assert_eq!(last.text, STREAM_FAILURE_NOTICE);
    assert_eq!(session.state(), &AppState::Ready);
}

#[tokio::test]
async fn error_event_mid_stream_keeps_partial_text() {
    let body = [
        sse_chunk("The Treaty of"),
        "data: {\"error\":{\"code\":503,\"message\":\"overloaded\"}}\r\n\r\n".to_string(),
        sse_chunk(" never arrives"),
    ]
    .concat();
    let (base, _) = serve(Canned::new("200 OK", "text/event-stream", body)).await;

    let mut session = ChatSession::with_gemini(config(&base)).unwrap();
    session.install_book(book("History", 2));

    let mut reply = CollectReply::default();
    let outcome = session.send_message("Summarise", None, &mut reply).await;

    assert!(matches!(outcome, SendOutcome::Failed { .. }));
    assert_eq!(reply.text, "The Treaty of");
    let last = session.transcript().last().unwrap();
    assert_eq!(last.text, format!("The Treaty of\n\n{STREAM_FAILURE_NOTICE}"));
}

#[tokio::test]
async fn send_without_book_makes_no_request() {
    let (base, log) = serve(Canned::new("200 OK", "text/event-stream", "")).await;
    let mut session = ChatSession::with_gemini(config(&base)).unwrap();

    let mut reply = CollectReply::default();
    let outcome = session.send_message("anything", None, &mut reply).await;

    assert_eq!(outcome, SendOutcome::NoBook);
    assert!(session.panel_open());
    assert!(session.transcript().is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn silent_api_times_out_instead_of_hanging() {
    let base = serve_silent().await;
    let cfg = ChatConfig::builder()
        .api_key("test-key")
        .api_base_url(&base)
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let mut session = ChatSession::with_gemini(cfg).unwrap();
    session.install_book(book("Geography", 1));

    let mut reply = CollectReply::default();
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        session.send_message("Where is Everest?", None, &mut reply),
    )
    .await
    .expect("send must give up once the idle timeout passes");

    let SendOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("1s"), "{message}");
    assert_eq!(reply.failure.as_deref(), Some(STREAM_FAILURE_NOTICE));
    assert_eq!(session.transcript().last().unwrap().text, STREAM_FAILURE_NOTICE);
    assert_eq!(session.state(), &AppState::Ready);
}
