//! Images the user attaches to a question.
//!
//! An attachment is held the way a browser file reader produces it: a
//! `data:` URL with the base64 payload after the comma. The mime type sent to
//! the model is inferred from that prefix.

use crate::error::BookChatError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A PNG or JPEG image held in memory as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    data_url: String,
}

impl ImageAttachment {
    /// Wrap an existing `data:` URL.
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    /// Build an attachment from raw image bytes and their mime type.
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self::from_data_url(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    /// Read an image file entirely into memory.
    ///
    /// Only `.png`, `.jpg`, and `.jpeg` files are accepted.
    pub async fn from_path(path: &Path) -> Result<Self, BookChatError> {
        let mime = mime_for_extension(path).ok_or_else(|| BookChatError::UnsupportedAttachment {
            path: path.to_path_buf(),
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| BookChatError::AttachmentUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Attached {} ({} bytes, {})", path.display(), bytes.len(), mime);
        Ok(Self::from_bytes(&bytes, mime))
    }

    /// `image/png` when the URL declares PNG, `image/jpeg` otherwise.
    pub fn mime_type(&self) -> &'static str {
        if self.data_url.starts_with("data:image/png") {
            "image/png"
        } else {
            "image/jpeg"
        }
    }

    /// The base64 payload after the first comma; empty if there is none.
    pub fn base64_payload(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }

    /// Approximate decoded size in bytes.
    pub fn approx_size(&self) -> usize {
        self.base64_payload().len() / 4 * 3
    }
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn png_prefix_infers_png() {
        let a = ImageAttachment::from_data_url("data:image/png;base64,AAAA");
        assert_eq!(a.mime_type(), "image/png");
        assert_eq!(a.base64_payload(), "AAAA");
    }

    #[test]
    fn anything_else_is_jpeg() {
        let a = ImageAttachment::from_data_url("data:image/jpeg;base64,BBBB");
        assert_eq!(a.mime_type(), "image/jpeg");
        let b = ImageAttachment::from_data_url("data:image/webp;base64,CCCC");
        assert_eq!(b.mime_type(), "image/jpeg");
    }

    #[test]
    fn from_bytes_round_trips_payload() {
        let a = ImageAttachment::from_bytes(b"hello", "image/png");
        assert_eq!(a, ImageAttachment::from_data_url("data:image/png;base64,aGVsbG8="));
        assert_eq!(a.base64_payload(), "aGVsbG8=");
    }

    #[test]
    fn missing_comma_gives_empty_payload() {
        let a = ImageAttachment::from_data_url("garbage");
        assert_eq!(a.base64_payload(), "");
    }

    #[tokio::test]
    async fn from_path_reads_jpeg() {
        let mut f = tempfile::Builder::new().suffix(".JPG").tempfile().unwrap();
        f.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();
        let a = ImageAttachment::from_path(f.path()).await.unwrap();
        assert_eq!(a.mime_type(), "image/jpeg");
        assert_eq!(a.base64_payload(), "/9j/");
    }

    #[tokio::test]
    async fn from_path_rejects_gif() {
        let f = tempfile::Builder::new().suffix(".gif").tempfile().unwrap();
        let err = ImageAttachment::from_path(f.path()).await.unwrap_err();
        assert!(matches!(err, BookChatError::UnsupportedAttachment { .. }));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = ImageAttachment::from_path(Path::new("/no/such/dir/pic.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookChatError::AttachmentUnreadable { .. }));
    }
}
