//! Configuration for a chat session.
//!
//! Every knob lives in [`ChatConfig`], built via [`ChatConfigBuilder`].
//! The credential is the only required value and is normally read from the
//! process environment with [`ChatConfig::from_env`].

use crate::error::BookChatError;
use std::fmt;
use std::path::PathBuf;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "API_KEY";

/// Accepted alternative name for the API key variable.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default API endpoint root.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for loading books and talking to the generation API.
///
/// # Example
/// ```rust
/// use bookchat::ChatConfig;
///
/// let config = ChatConfig::builder()
///     .api_key("test-key")
///     .render_scale(2.0)
///     .jpeg_quality(85)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-2.5-flash");
/// ```
#[derive(Clone)]
pub struct ChatConfig {
    /// Credential for the generation API. Never printed.
    pub api_key: String,

    /// Model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// API root, without a trailing slash. Default: the public Gemini endpoint.
    pub api_base_url: String,

    /// Page viewport scale relative to the PDF's point size. Range: 0.25–4.0. Default: 1.5.
    ///
    /// At 1.5 an A4 page renders at roughly 893 × 1263 px, enough for the
    /// model to read body text.
    pub render_scale: f32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    ///
    /// Guards against poster-sized pages, whose scaled viewport would
    /// otherwise allocate hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// JPEG quality for page images, 1–100. Default: 92.
    pub jpeg_quality: u8,

    /// Sampling temperature. `None` leaves the model default.
    pub temperature: Option<f32>,

    /// Cap on generated tokens per reply. `None` leaves the model default.
    pub max_output_tokens: Option<u32>,

    /// Replacement for the built-in system instruction.
    pub system_prompt: Option<String>,

    /// PDF user password for encrypted books.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library.
    pub pdfium_library: Option<PathBuf>,

    /// Download timeout for catalog and URL books in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest silence tolerated between streamed events in seconds. Default: 120.
    pub api_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            render_scale: 1.5,
            max_rendered_pixels: 4000,
            jpeg_quality: 92,
            temperature: None,
            max_output_tokens: None,
            system_prompt: None,
            password: None,
            pdfium_library: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library", &self.pdfium_library)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ChatConfig {
    /// Create a new builder for `ChatConfig`.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default configuration with the key taken from `API_KEY`, falling back
    /// to `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// [`BookChatError::MissingApiKey`] when neither variable holds a value.
    pub fn from_env() -> Result<Self, BookChatError> {
        Self::builder().api_key(api_key_from_env()?).build()
    }
}

/// Read the API key from the environment.
pub fn api_key_from_env() -> Result<String, BookChatError> {
    [API_KEY_ENV, GEMINI_API_KEY_ENV]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .ok_or(BookChatError::MissingApiKey)
}

/// Builder for [`ChatConfig`].
#[derive(Debug)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChatConfig, BookChatError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(BookChatError::MissingApiKey);
        }
        if c.model.trim().is_empty() {
            return Err(BookChatError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(BookChatError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(BookChatError::InvalidConfig(
                "timeouts must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
