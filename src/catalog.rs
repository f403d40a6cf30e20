//! Built-in catalog of books hosted online, plus the other places a book
//! can come from.

use crate::error::BookChatError;
use crate::pipeline::input::is_url;
use std::fmt;
use std::path::PathBuf;

/// A titled PDF available for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: &'static str,
    pub url: &'static str,
}

/// The predefined books, in display order.
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        title: "Social Studies Grade 9",
        url: "https://raw.githubusercontent.com/Hexagrim/PrynixStudyAI/main/social_1.pdf",
    },
    CatalogEntry {
        title: "Nepali Grade 9",
        url: "https://raw.githubusercontent.com/Hexagrim/PrynixStudyAI/main/nepali.pdf",
    },
    CatalogEntry {
        title: "Optional Math Grade 9",
        url: "https://raw.githubusercontent.com/Hexagrim/PrynixStudyAI/main/opt.pdf",
    },
];

/// Look up a catalog entry by 1-based number or case-insensitive title.
pub fn find(query: &str) -> Result<&'static CatalogEntry, BookChatError> {
    let q = query.trim();

    let by_number = q
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| CATALOG.get(i));

    by_number
        .or_else(|| CATALOG.iter().find(|e| e.title.eq_ignore_ascii_case(q)))
        .ok_or_else(|| BookChatError::UnknownBook {
            query: q.to_string(),
        })
}

/// Where a book is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookSource {
    /// One of the predefined [`CATALOG`] books.
    Catalog(&'static CatalogEntry),
    /// Any other HTTP(S) URL.
    Url(String),
    /// A PDF on the local file system.
    File(PathBuf),
}

impl BookSource {
    /// Interpret free-form input: a catalog number or title, a URL, or a path.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(entry) = find(input) {
            BookSource::Catalog(entry)
        } else if is_url(input) {
            BookSource::Url(input.to_string())
        } else {
            BookSource::File(PathBuf::from(input))
        }
    }

    /// A catalog book by 1-based number or title; never a path or URL.
    pub fn from_catalog(query: &str) -> Result<Self, BookChatError> {
        find(query).map(BookSource::Catalog)
    }

    /// Name shown to the user while and after loading.
    pub fn display_name(&self) -> String {
        match self {
            BookSource::Catalog(entry) => entry.title.to_string(),
            BookSource::Url(url) => url
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or(url)
                .to_string(),
            BookSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// `true` for sources that go through the upload path.
    pub fn is_upload(&self) -> bool {
        matches!(self, BookSource::File(_))
    }
}

impl fmt::Display for BookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
