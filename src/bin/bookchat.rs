//! CLI binary for bookchat.
//!
//! A thin interactive shell over the library crate: maps CLI flags to
//! `ChatConfig`, reads commands and questions from stdin, and prints replies
//! as they stream in.

use anyhow::{Context, Result};
use bookchat::config::api_key_from_env;
use bookchat::prompts::NO_BOOK_MESSAGE;
use bookchat::view;
use bookchat::{
    BookLoadProgress, BookSource, ChatConfig, ChatSession, ImageAttachment, LoadOutcome,
    NoopProgress, ProgressCallback, ReplyObserver, Role, SendOutcome, UploadProgress, CATALOG,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Book-load progress using indicatif ───────────────────────────────────────

/// Terminal progress for one book load: a spinner while the PDF is fetched,
/// then a page bar once the page count is known.
struct CliLoadProgress {
    bar: ProgressBar,
}

impl CliLoadProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message(view::render_progress(UploadProgress::default()));
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }

    /// Clear the bar whether the load finished or failed.
    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BookLoadProgress for CliLoadProgress {
    fn on_load_start(&self, name: &str) {
        self.bar.set_message(format!("Fetching \"{name}\"…"));
    }

    fn on_pages_counted(&self, total: usize) {
        self.activate_bar(total);
    }

    fn on_page_rendered(&self, current: usize, total: usize) {
        self.bar.set_position(current as u64);
        self.bar
            .set_message(dim(&view::render_progress(UploadProgress::new(current, total))));
    }

    fn on_load_complete(&self, _total: usize) {
        self.finish();
    }
}

// ── Streamed reply printer ───────────────────────────────────────────────────

/// Prints fragments to stdout as they arrive. The model header is written
/// lazily so that a send that never reaches the API prints nothing.
#[derive(Default)]
struct StdoutReply {
    started: bool,
}

impl StdoutReply {
    fn start(&mut self) {
        if !self.started {
            self.started = true;
            println!("{}", cyan(&view::turn_header(Role::Model)));
        }
    }
}

impl ReplyObserver for StdoutReply {
    fn on_fragment(&mut self, fragment: &str) {
        self.start();
        print!("{fragment}");
        io::stdout().flush().ok();
    }

    fn on_failure(&mut self, notice: &str) {
        self.start();
        println!("\n\n{}", red(notice));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start with the first catalog book
  bookchat --book 1

  # Chat about a local textbook
  bookchat --book ./physics.pdf

  # Use another model and a custom persona
  bookchat --model gemini-2.5-pro --system-prompt persona.txt --book 2

  # List the provided books (no API key needed)
  bookchat --list-books

COMMANDS (inside the chat):
  /books             Show or hide the book panel
  /load <n|title>    Load a provided book by number or title
  /open <path|url>   Load a custom PDF from disk or the web
  /attach <image>    Attach a .png/.jpg/.jpeg to the next question
  /detach            Drop the pending attachment
  /history           Reprint the conversation
  /help              Show this list
  /quit              Leave

ENVIRONMENT VARIABLES:
  API_KEY             Gemini API key (GEMINI_API_KEY also accepted)
  BOOKCHAT_MODEL      Override model ID
  PDFIUM_LIB_PATH     Path to an existing libpdfium
  RUST_LOG            Log filter (tracing EnvFilter syntax)

SETUP:
  1. Set API key:     export API_KEY=...
  2. Provide pdfium:  place libpdfium next to the binary or set PDFIUM_LIB_PATH
  3. Chat:            bookchat --book 1

  Every question sends every page of the book. Long books mean large
  requests; lower --render-scale or --jpeg-quality to shrink them.
"#;

const REPL_HELP: &str = "\
/books             Show or hide the book panel
/load <n|title>    Load a provided book by number or title
/open <path|url>   Load a custom PDF from disk or the web
/attach <image>    Attach a .png/.jpg/.jpeg to the next question
/detach            Drop the pending attachment
/history           Reprint the conversation
/help              Show this list
/quit              Leave
Anything else is sent as a question. An empty line sends a pending image on its own.";

/// Chat with a PDF book through Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "bookchat",
    version,
    about = "Chat with a PDF book through a multimodal LLM",
    long_about = "Rasterise every page of a PDF book and ask questions about it. Each question \
is sent to Google Gemini together with all page images; the answer streams back into the \
terminal.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Book to load at startup: catalog number or title, file path, or URL.
    #[arg(short, long, env = "BOOKCHAT_BOOK")]
    book: Option<String>,

    /// Print the provided books and exit.
    #[arg(long)]
    list_books: bool,

    /// Gemini model ID.
    #[arg(long, env = "BOOKCHAT_MODEL")]
    model: Option<String>,

    /// Override the API base URL (proxies, test servers).
    #[arg(long, env = "BOOKCHAT_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Page render scale relative to 72 DPI (0.25–4.0).
    #[arg(long, env = "BOOKCHAT_RENDER_SCALE", default_value_t = 1.5)]
    render_scale: f32,

    /// Cap on the longer edge of a rendered page, in pixels.
    #[arg(long, env = "BOOKCHAT_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// JPEG quality for page images (1–100).
    #[arg(long, env = "BOOKCHAT_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Sampling temperature (0.0–2.0). Model default when unset.
    #[arg(long, env = "BOOKCHAT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens per reply. Model default when unset.
    #[arg(long, env = "BOOKCHAT_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// PDF user password for encrypted books.
    #[arg(long, env = "BOOKCHAT_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "BOOKCHAT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to the pdfium shared library or its directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "BOOKCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Max seconds to wait between streamed reply chunks.
    #[arg(long, env = "BOOKCHAT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable the progress bar and show INFO logs instead.
    #[arg(long, env = "BOOKCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BOOKCHAT_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar and the
    // streamed reply, so they are off unless the bar is disabled.
    let filter = if cli.verbose {
        "debug"
    } else if cli.no_progress {
        "info"
    } else {
        "error"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_books {
        for (i, entry) in CATALOG.iter().enumerate() {
            println!("{:>2}. {}", i + 1, entry.title);
        }
        return Ok(());
    }

    let config = build_config(&cli).await?;
    let mut session = ChatSession::with_gemini(config).context("Failed to start chat session")?;

    eprintln!(
        "{} {}  {}",
        cyan("◆"),
        bold("bookchat"),
        dim(&format!("model {}", session.config().model))
    );

    if let Some(ref book) = cli.book {
        load(&mut session, &BookSource::parse(book), !cli.no_progress).await;
    } else {
        session.toggle_panel();
        print_panel(&session);
    }

    repl(&mut session, !cli.no_progress).await
}

/// Map CLI args to `ChatConfig`.
async fn build_config(cli: &Cli) -> Result<ChatConfig> {
    let api_key = api_key_from_env().context("No Gemini API key configured")?;

    let mut builder = ChatConfig::builder()
        .api_key(api_key)
        .render_scale(cli.render_scale)
        .max_rendered_pixels(cli.max_pixels)
        .jpeg_quality(cli.jpeg_quality)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library(path);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// Read commands and questions until EOF or `/quit`.
async fn repl(session: &mut ChatSession, show_progress: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<ImageAttachment> = None;

    loop {
        prompt(session, pending.as_ref());
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", dim(REPL_HELP)),
            "/books" => {
                session.toggle_panel();
                print_panel(session);
            }
            "/load" | "/open" if arg.is_empty() => {
                println!("{}", red(&format!("Usage: {command} <book>")));
            }
            "/load" => match BookSource::from_catalog(arg) {
                Ok(source) => load(session, &source, show_progress).await,
                Err(e) => eprintln!("{} {}", red("✘"), red(&e.to_string())),
            },
            "/open" => {
                load(session, &BookSource::parse(arg), show_progress).await;
            }
            "/attach" => match ImageAttachment::from_path(Path::new(arg)).await {
                Ok(image) => {
                    println!(
                        "{} {}",
                        green("✓"),
                        dim(&format!("{} attached to your next question", image.mime_type()))
                    );
                    pending = Some(image);
                }
                Err(e) => println!("{}", red(&e.to_string())),
            },
            "/detach" => {
                if pending.take().is_some() {
                    println!("{}", dim("Attachment removed."));
                }
            }
            "/history" => println!("{}", view::render_session(session)),
            c if c.starts_with('/') => {
                println!("{}", red(&format!("Unknown command {c}. Type /help.")));
            }
            _ => {
                if line.is_empty() && pending.is_none() {
                    continue;
                }
                let image = pending.take();
                ask(session, line, image).await;
            }
        }
    }

    Ok(())
}

fn prompt(session: &ChatSession, pending: Option<&ImageAttachment>) {
    let hint = view::input_hint(session.state(), session.has_book());
    let marker = if pending.is_some() { " [image]" } else { "" };
    if view::send_enabled(session.state(), session.has_book()) {
        print!("{}{} ", bold("›"), dim(marker));
    } else {
        print!("{} {} ", dim(hint), bold("›"));
    }
    io::stdout().flush().ok();
}

fn print_panel(session: &ChatSession) {
    if let Some(panel) =
        view::render_panel(CATALOG, session.book(), session.state(), session.panel_open())
    {
        println!("{panel}");
    }
}

async fn load(session: &mut ChatSession, source: &BookSource, show_progress: bool) {
    let bar = show_progress.then(CliLoadProgress::new);
    let progress: ProgressCallback = match &bar {
        Some(b) => b.clone(),
        None => Arc::new(NoopProgress),
    };

    let outcome = session.load_book(source, progress).await;
    if let Some(b) = &bar {
        b.finish();
    }

    match outcome {
        LoadOutcome::Loaded { name, pages } => {
            eprintln!("{} {} {}", green("✔"), bold(&name), dim(&format!("{pages} pages")));
            if let Some(greeting) = session.transcript().last() {
                println!("{}", cyan(&view::render_message(greeting)));
            }
        }
        LoadOutcome::Failed { message } => eprintln!("{} {}", red("✘"), red(&message)),
        LoadOutcome::Busy => eprintln!("{}", dim("Still busy, try again in a moment.")),
    }
}

async fn ask(session: &mut ChatSession, text: &str, image: Option<ImageAttachment>) {
    let mut reply = StdoutReply::default();
    match session.send_message(text, image, &mut reply).await {
        SendOutcome::Completed => println!(),
        SendOutcome::Failed { .. } => {}
        SendOutcome::NoBook => {
            println!("{}", red(session.error_message().unwrap_or(NO_BOOK_MESSAGE)));
            print_panel(session);
        }
        SendOutcome::Empty => {}
        SendOutcome::Busy => println!("{}", dim("Still busy, try again in a moment.")),
    }
}
