//! Pipeline stages that turn a book source into page images.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode
//! (URL/path)  (pdfium)  (JPEG/base64)
//! ```
//!
//! 1. [`input`]:  download or read the PDF into memory and check its signature
//! 2. [`render`]: rasterise every page in order; runs in `spawn_blocking`
//!    because pdfium is blocking
//! 3. [`encode`]: flatten to RGB, JPEG-encode, and base64-wrap each page for
//!    the multimodal request body

pub mod encode;
pub mod input;
pub mod render;
