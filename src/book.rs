//! Book loading: fetch or read a PDF and rasterise it into a page set.

use crate::catalog::BookSource;
use crate::config::ChatConfig;
use crate::error::BookChatError;
use crate::pipeline::encode::PageImage;
use crate::pipeline::{input, render};
use crate::progress::ProgressCallback;
use std::time::Instant;
use tracing::info;

/// Ordered page images of one book, index-aligned with page number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPageSet {
    pages: Vec<PageImage>,
}

impl BookPageSet {
    pub fn new(pages: Vec<PageImage>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[PageImage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Total base64 bytes across all pages.
    pub fn payload_bytes(&self) -> usize {
        self.pages.iter().map(|p| p.data.len()).sum()
    }
}

/// A fully converted book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBook {
    pub name: String,
    pub pages: BookPageSet,
}

impl LoadedBook {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Fetch or read `source` and rasterise every page.
///
/// Either every page converts or the call fails; no partial book is returned.
pub async fn load_book(
    source: &BookSource,
    config: &ChatConfig,
    progress: ProgressCallback,
) -> Result<LoadedBook, BookChatError> {
    let start = Instant::now();
    progress.on_load_start(&source.display_name());

    let pdf = input::resolve_source(source, config.download_timeout_secs).await?;
    let pages = render::render_book(&pdf.name, pdf.bytes, config, progress.clone()).await?;

    let book = LoadedBook {
        name: pdf.name,
        pages: BookPageSet::new(pages),
    };
    progress.on_load_complete(book.page_count());

    info!(
        "Loaded '{}': {} pages, {} KiB of page images in {}ms",
        book.name,
        book.page_count(),
        book.pages.payload_bytes() / 1024,
        start.elapsed().as_millis()
    );
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> PageImage {
        PageImage {
            page_num: n,
            width: 1,
            height: 1,
            data: "QUJD".into(),
        }
    }

    #[test]
    fn page_set_keeps_order() {
        let set = BookPageSet::new(vec![page(1), page(2), page(3)]);
        let nums: Vec<usize> = set.pages().iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(set.payload_bytes(), 12);
    }

    #[tokio::test]
    async fn load_fails_before_render_for_non_pdf() {
        let config = ChatConfig::builder().api_key("k").build().unwrap();
        let source = BookSource::File("notes.txt".into());
        let err = load_book(&source, &config, std::sync::Arc::new(crate::progress::NoopProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, BookChatError::NotAPdfFile { .. }));
    }
}
