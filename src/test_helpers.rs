//! Shared test utilities for the simple-journal test suite.
//!
//! Provides a builder for throwaway journal directories plus lookup helpers
//! that panic with the available candidates on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let journal = JournalBuilder::new()
//!     .dated_entry("2023/park/entry.md", "Park", "2023-05-01")
//!     .file("2023/park/photos/a.jpg", b"jpeg")
//!     .build();
//!
//! let store = Store::load(journal.path(), &config, &backend).unwrap();
//! let doc = find_document(store.documents(), "Park");
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::types::Document;
use chrono::NaiveDate;

// =========================================================================
// Fixture setup
// =========================================================================

/// Collects files and writes them into a fresh temp directory.
#[derive(Default)]
pub struct JournalBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl JournalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry with verbatim content.
    pub fn entry(self, rel: &str, content: &str) -> Self {
        self.file(rel, content.as_bytes())
    }

    /// An entry with a title and date in its front matter and a one-line body.
    pub fn dated_entry(self, rel: &str, title: &str, date: &str) -> Self {
        let content = format!("---\ntitle: {title}\ndate: {date}\n---\nWritten on {date}.\n");
        self.entry(rel, &content)
    }

    pub fn periods(self, yaml: &str) -> Self {
        self.entry("periods.yaml", yaml)
    }

    pub fn file(mut self, rel: &str, content: &[u8]) -> Self {
        self.files.push((PathBuf::from(rel), content.to_vec()));
        self
    }

    pub fn build(self) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (rel, content) in self.files {
            write_file(&tmp.path().join(rel), &content);
        }
        tmp
    }
}

pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bare in-memory document.
pub fn doc_titled(path: &str, title: &str, date: NaiveDate) -> Document {
    Document::new(PathBuf::from("/journal").join(path), title, date)
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find a document by title. Panics if not found.
pub fn find_document<'a>(documents: &'a [Document], title: &str) -> &'a Document {
    documents.iter().find(|d| d.title == title).unwrap_or_else(|| {
        let titles = document_titles(documents);
        panic!("document '{title}' not found. Available: {titles:?}")
    })
}

/// All document titles in slice order.
pub fn document_titles(documents: &[Document]) -> Vec<&str> {
    documents.iter().map(|d| d.title.as_str()).collect()
}
