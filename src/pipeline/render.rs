//! PDF rasterisation: render every page of a book to a JPEG payload via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is blocking
//! and not async-aware. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so the chat loop stays responsive while a book converts.
//!
//! Pages are processed strictly in order and each bitmap is encoded and
//! dropped before the next page renders, so at most one page's pixels are
//! alive at a time. Any failure aborts the whole book: a partially converted
//! page set is never returned.

use crate::config::ChatConfig;
use crate::error::BookChatError;
use crate::pipeline::encode::{self, PageImage};
use crate::progress::ProgressCallback;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Settings the blocking renderer needs, detached from the config borrow.
#[derive(Debug, Clone)]
struct RenderSettings {
    scale: f32,
    max_pixels: u32,
    quality: u8,
    password: Option<String>,
    library: Option<std::path::PathBuf>,
}

impl RenderSettings {
    fn from_config(config: &ChatConfig) -> Self {
        Self {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
            quality: config.jpeg_quality,
            password: config.password.clone(),
            library: config.pdfium_library.clone(),
        }
    }
}

/// Rasterise every page of `bytes`, in page order.
///
/// `progress` receives the page count once the document is open and one
/// event per finished page.
pub async fn render_book(
    name: &str,
    bytes: Vec<u8>,
    config: &ChatConfig,
    progress: ProgressCallback,
) -> Result<Vec<PageImage>, BookChatError> {
    let settings = RenderSettings::from_config(config);
    let name = name.to_string();

    tokio::task::spawn_blocking(move || render_book_blocking(&name, bytes, &settings, &progress))
        .await
        .map_err(|e| BookChatError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind to a pdfium library.
///
/// Resolution order: the explicit `library` path, `PDFIUM_LIB_PATH`, the
/// current directory, the executable's directory, then the system library
/// path.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, BookChatError> {
    let explicit = library
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(Into::into));

    if let Some(path) = explicit {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            BookChatError::PdfiumBindingFailed(format!("{} ({:?})", path.display(), e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates = vec![Pdfium::pdfium_platform_library_name_at_path("./")];
    if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }

    for path in &candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(path) {
            debug!("Bound pdfium from {}", path.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| BookChatError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of book rendering.
fn render_book_blocking(
    name: &str,
    bytes: Vec<u8>,
    settings: &RenderSettings,
    progress: &ProgressCallback,
) -> Result<Vec<PageImage>, BookChatError> {
    let pdfium = bind_pdfium(settings.library.as_deref())?;
    let password = settings.password.as_deref();

    let document = pdfium.load_pdf_from_byte_vec(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                BookChatError::WrongPassword {
                    source_name: name.to_string(),
                }
            } else {
                BookChatError::PasswordRequired {
                    source_name: name.to_string(),
                }
            }
        } else {
            BookChatError::CorruptPdf {
                source_name: name.to_string(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF '{}' loaded: {} pages", name, total_pages);

    if total_pages == 0 {
        return Err(BookChatError::EmptyDocument {
            source_name: name.to_string(),
        });
    }
    progress.on_pages_counted(total_pages);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page_num = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| BookChatError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let (width, height) = viewport(
            page.width().value,
            page.height().value,
            settings.scale,
            settings.max_pixels,
        );

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            BookChatError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let encoded = encode::encode_page(page_num, &image, settings.quality).map_err(|e| {
            BookChatError::EncodingFailed {
                page: page_num,
                detail: e.to_string(),
            }
        })?;
        results.push(encoded);
        progress.on_page_rendered(page_num, total_pages);
    }

    Ok(results)
}

/// Pixel size of a page of `width_pt` × `height_pt` points at `scale`,
/// shrunk proportionally so neither edge exceeds `max_pixels`.
pub fn viewport(width_pt: f32, height_pt: f32, scale: f32, max_pixels: u32) -> (i32, i32) {
    let mut w = (width_pt * scale).max(1.0);
    let mut h = (height_pt * scale).max(1.0);

    let longest = w.max(h);
    let cap = max_pixels as f32;
    if longest > cap {
        let shrink = cap / longest;
        w *= shrink;
        h *= shrink;
    }

    (w.round().max(1.0) as i32, h.round().max(1.0) as i32)
}
