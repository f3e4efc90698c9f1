//! Document store: every journal entry under a root directory.
//!
//! Loading walks the root for `.md` files, splits and parses each file's front
//! matter, runs the markup pipeline over the body, then applies periods. It is
//! all-or-nothing: one unreadable entry or bad date fails the whole load,
//! because tag pages, periods and neighbour links all assume a complete set.
//!
//! Ordering is a separate step. [`Store::load`] keeps walk order;
//! [`Store::sort_documents_by_date`] and [`Store::sort_tags`] are explicit.
//!
//! ## Periods
//!
//! `periods.yaml` in the journal root names date ranges:
//!
//! ```yaml
//! Spring in Lisbon:
//!   from: 2023-03-01
//!   to: 2023-05-31
//! ```
//!
//! Every document inside a range gets a `period` tag. When ranges overlap the
//! one with the earliest `from` wins (then the alphabetically first name), and
//! a warning names the losers.

use crate::config::JournalConfig;
use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::imaging::ImageBackend;
use crate::markup::{self, MarkupContext, MarkupError};
use crate::naming::{self, Variant, media_resource};
use crate::types::{Document, MediaRef, Period, Tag, normalize_tag_name};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

const CONTENT_EXTENSION: &str = "md";
const DEFAULT_PREVIEW: &str = "preview.jpg";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("{}: no date in front matter or file name", .0.display())]
    MissingDate(PathBuf),
    #[error("{} and {} both render to {file}", .first.display(), .second.display())]
    DuplicateOutput {
        file: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Invalid periods file {}: {message}", .path.display())]
    Periods { path: PathBuf, message: String },
}

/// Why a single document failed to load.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("front matter: {0}")]
    FrontMatter(#[from] FrontMatterError),
    #[error("markup: {0}")]
    Markup(#[from] MarkupError),
}

pub struct Store {
    root: PathBuf,
    documents: Vec<Document>,
    periods: Vec<Period>,
    tags: Vec<Tag>,
}

impl Store {
    /// Load every document under `root`.
    pub fn load(
        root: &Path,
        config: &JournalConfig,
        backend: &dyn ImageBackend,
    ) -> Result<Self, LoadError> {
        let periods_path = root.join(&config.periods.file);
        let periods = if periods_path.is_file() {
            load_periods(&periods_path)?
        } else {
            Vec::new()
        };

        let ctx = MarkupContext {
            gallery: &config.gallery,
            tracks: &config.tracks,
            backend,
        };
        let mut documents = Vec::new();
        for path in content_files(root)? {
            documents.push(load_document(&path, &ctx)?);
        }
        debug!(root = %root.display(), documents = documents.len(), "loaded journal");

        let store = Self::from_documents(root, documents, periods);
        store.check_unique_outputs()?;
        Ok(store)
    }

    /// Build a store from already loaded documents. Periods are applied here.
    pub fn from_documents(root: &Path, mut documents: Vec<Document>, mut periods: Vec<Period>) -> Self {
        periods.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.name.cmp(&b.name)));
        apply_periods(&mut documents, &periods);

        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for tag in documents.iter().flat_map(|d| &d.tags) {
            if seen.insert(tag.normalized()) {
                tags.push(tag.clone());
            }
        }

        Self {
            root: root.to_path_buf(),
            documents,
            periods,
            tags,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Periods ordered by start date.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Distinct tags, first-seen order until [`Store::sort_tags`].
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Newest first. Same-day entries are ordered by path so the order is
    /// stable between builds.
    pub fn sort_documents_by_date(&mut self) {
        self.documents
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.path.cmp(&b.path)));
    }

    pub fn sort_tags(&mut self) {
        self.tags.sort_by_key(|t| t.normalized());
    }

    pub fn documents_on_date(&self, date: NaiveDate) -> Vec<&Document> {
        self.documents.iter().filter(|d| d.date == date).collect()
    }

    pub fn documents_by_tag(&self, name: &str) -> Vec<&Document> {
        let name = normalize_tag_name(name);
        self.documents.iter().filter(|d| d.has_tag(&name)).collect()
    }

    pub fn tags_by_category(&self) -> BTreeMap<String, Vec<Tag>> {
        let mut groups: BTreeMap<String, Vec<Tag>> = BTreeMap::new();
        for tag in &self.tags {
            groups.entry(tag.category.clone()).or_default().push(tag.clone());
        }
        groups
    }

    /// The period a date belongs to, by the same precedence used for tagging.
    pub fn period_on(&self, date: NaiveDate) -> Option<&Period> {
        self.periods.iter().find(|p| p.contains(date))
    }

    /// Two documents with the same date and normalized title would overwrite
    /// each other's page.
    pub fn check_unique_outputs(&self) -> Result<(), LoadError> {
        let mut owners: HashMap<String, &Path> = HashMap::new();
        for doc in &self.documents {
            let file = naming::entry_file(doc);
            if let Some(first) = owners.insert(file.clone(), &doc.path) {
                return Err(LoadError::DuplicateOutput {
                    file,
                    first: first.to_path_buf(),
                    second: doc.path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Markdown files under `root`, in file-name order. Hidden entries are skipped.
fn content_files(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        let is_content = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(CONTENT_EXTENSION));
        if entry.file_type().is_file() && is_content {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Read one entry: front matter, then body markup.
pub fn load_document(path: &Path, ctx: &MarkupContext<'_>) -> Result<Document, LoadError> {
    let wrap = |source: DocumentError| LoadError::Document {
        path: path.to_path_buf(),
        source,
    };

    let source = fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
    let split = frontmatter::split(&source).map_err(|e| wrap(e.into()))?;
    let fm = match split.front_matter {
        Some(yaml) => frontmatter::parse(yaml).map_err(|e| wrap(e.into()))?,
        None => FrontMatter::default(),
    };

    let date = match fm.parsed_date().map_err(|e| wrap(e.into()))? {
        Some(date) => date,
        None => frontmatter::date_from_path(path)
            .ok_or_else(|| LoadError::MissingDate(path.to_path_buf()))?,
    };
    let title = fm
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| frontmatter::title_from_path(path));

    let mut doc = Document::new(path, title, date);
    doc.author = fm.author.clone();
    doc.abstract_text = fm.abstract_text.clone();
    doc.tags = fm.tags();
    doc.has_front_matter = split.front_matter.is_some();
    doc.preview = resolve_preview(&doc, fm.preview.as_deref());

    markup::convert(&mut doc, split.body, ctx).map_err(|e| wrap(e.into()))?;
    Ok(doc)
}

/// Explicit preview from front matter, else `preview.jpg` next to the entry.
fn resolve_preview(doc: &Document, explicit: Option<&str>) -> Option<MediaRef> {
    let source = match explicit {
        Some(rel) => {
            let source = doc.directory().join(rel);
            if !source.is_file() {
                warn!(document = %doc.path.display(), preview = %source.display(), "preview image does not exist");
                return None;
            }
            source
        }
        None => {
            let source = doc.directory().join(DEFAULT_PREVIEW);
            if !source.is_file() {
                return None;
            }
            source
        }
    };
    let resource = media_resource(&source, Variant::Thumbnail);
    Some(MediaRef { source, resource })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PeriodEntry {
    from: String,
    to: String,
}

/// Parse a periods file. Order of the result is unspecified.
pub fn load_periods(path: &Path) -> Result<Vec<Period>, LoadError> {
    let invalid = |message: String| LoadError::Periods {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: BTreeMap<String, PeriodEntry> =
        serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))?;

    entries
        .into_iter()
        .map(|(name, entry)| {
            let parse = |value: &str| {
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|_| invalid(format!("period '{name}': invalid date '{value}'")))
            };
            let from = parse(&entry.from)?;
            let to = parse(&entry.to)?;
            if from > to {
                return Err(invalid(format!("period '{name}' ends before it starts")));
            }
            Ok(Period { name, from, to })
        })
        .collect()
}

/// Tag each document with the first period (in `periods` order) containing it.
fn apply_periods(documents: &mut [Document], periods: &[Period]) {
    for doc in documents.iter_mut() {
        let mut matching = periods.iter().filter(|p| p.contains(doc.date));
        let Some(winner) = matching.next() else {
            continue;
        };
        let losers: Vec<&str> = matching.map(|p| p.name.as_str()).collect();
        if !losers.is_empty() {
            warn!(
                document = %doc.path.display(),
                period = %winner.name,
                ignored = ?losers,
                "date falls into overlapping periods"
            );
        }
        let tag = winner.tag();
        if !doc.tags.contains(&tag) {
            doc.tags.push(tag);
        }
        doc.period = Some(winner.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{JournalBuilder, doc_titled, document_titles, find_document, ymd};
    use crate::types::{CATEGORY_GENERAL, CATEGORY_PERIOD};
    use tempfile::TempDir;

    fn load(root: &Path) -> Result<Store, LoadError> {
        Store::load(root, &JournalConfig::default(), &MockBackend::new())
    }

    fn period(name: &str, from: NaiveDate, to: NaiveDate) -> Period {
        Period {
            name: name.into(),
            from,
            to,
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_reads_front_matter_and_body() {
        let journal = JournalBuilder::new()
            .entry(
                "2023/park/entry.md",
                "---\ntitle: Park\ndate: 2023-05-01\nauthor: Jo\nabstract: Ducks.\n\
                 tags:\n  location: [Berlin]\n---\n# Hello\n",
            )
            .build();
        let store = load(journal.path()).unwrap();

        assert_eq!(store.documents().len(), 1);
        let doc = &store.documents()[0];
        assert_eq!(doc.title, "Park");
        assert_eq!(doc.date, ymd(2023, 5, 1));
        assert_eq!(doc.author.as_deref(), Some("Jo"));
        assert_eq!(doc.abstract_text.as_deref(), Some("Ducks."));
        assert!(doc.has_front_matter);
        assert!(doc.has_tag("berlin"));
        assert!(doc.body_html.contains("<h1>Hello</h1>"));
    }

    #[test]
    fn document_without_front_matter_dates_from_path() {
        let journal = JournalBuilder::new()
            .entry("2023-05-02-lake.md", "Just text.\n")
            .build();
        let store = load(journal.path()).unwrap();
        let doc = &store.documents()[0];
        assert!(!doc.has_front_matter);
        assert_eq!(doc.date, ymd(2023, 5, 2));
        assert_eq!(doc.title, "lake");
    }

    #[test]
    fn missing_date_fails_whole_load() {
        let journal = JournalBuilder::new()
            .dated_entry("2023-05-01-ok.md", "OK", "2023-05-01")
            .entry("notes.md", "No date anywhere.\n")
            .build();
        assert!(matches!(load(journal.path()), Err(LoadError::MissingDate(_))));
    }

    #[test]
    fn bad_date_and_bad_markup_fail_with_path() {
        let journal = JournalBuilder::new()
            .entry("a.md", "---\ndate: someday\n---\n")
            .build();
        match load(journal.path()) {
            Err(LoadError::Document { path, source }) => {
                assert!(path.ends_with("a.md"));
                assert!(matches!(source, DocumentError::FrontMatter(_)));
            }
            other => panic!("expected document error, got {:?}", other.err()),
        }

        let journal = JournalBuilder::new()
            .entry("b.md", "---\ndate: 2023-05-01\n---\n:: map ---\nfile: [\n---\n")
            .build();
        assert!(matches!(
            load(journal.path()),
            Err(LoadError::Document {
                source: DocumentError::Markup(_),
                ..
            })
        ));
    }

    #[test]
    fn hidden_and_non_markdown_files_are_ignored() {
        let journal = JournalBuilder::new()
            .dated_entry("a/entry.md", "A", "2023-05-01")
            .entry(".drafts/2023-06-01-draft.md", "Draft\n")
            .entry("a/notes.txt", "not markdown")
            .build();
        let store = load(journal.path()).unwrap();
        assert_eq!(store.documents().len(), 1);
    }

    #[test]
    fn duplicate_output_is_rejected() {
        let journal = JournalBuilder::new()
            .dated_entry("a/entry.md", "Same Title", "2023-05-01")
            .dated_entry("b/entry.md", "same title", "2023-05-01")
            .build();
        assert!(matches!(
            load(journal.path()),
            Err(LoadError::DuplicateOutput { .. })
        ));
    }

    #[test]
    fn preview_explicit_or_default_file() {
        let journal = JournalBuilder::new()
            .entry("a/entry.md", "---\ndate: 2023-05-01\npreview: cover.png\n---\n")
            .file("a/cover.png", b"png")
            .dated_entry("b/entry.md", "B", "2023-05-02")
            .file("b/preview.jpg", b"jpg")
            .dated_entry("c/entry.md", "C", "2023-05-03")
            .build();
        let mut store = load(journal.path()).unwrap();
        store.sort_documents_by_date();
        let docs = store.documents();

        assert!(docs[0].preview.is_none());
        assert!(docs[1].preview.as_ref().unwrap().source.ends_with("b/preview.jpg"));
        let explicit = docs[2].preview.as_ref().unwrap();
        assert!(explicit.source.ends_with("a/cover.png"));
        assert!(explicit.resource.uri.ends_with("-thumb.jpg"));
    }

    // =========================================================================
    // Periods
    // =========================================================================

    #[test]
    fn periods_tag_documents_in_range() {
        let journal = JournalBuilder::new()
            .dated_entry("a.md", "In", "2023-03-15")
            .dated_entry("b.md", "Out", "2023-07-01")
            .periods("Spring:\n  from: 2023-03-01\n  to: 2023-05-31\n")
            .build();
        let store = load(journal.path()).unwrap();
        let inside = find_document(store.documents(), "In");
        let outside = find_document(store.documents(), "Out");

        assert_eq!(inside.period.as_deref(), Some("Spring"));
        assert!(inside.tags.iter().any(|t| t.category == CATEGORY_PERIOD));
        assert!(outside.period.is_none());
        assert_eq!(store.period_on(ymd(2023, 5, 31)).unwrap().name, "Spring");
        assert!(store.period_on(ymd(2023, 6, 1)).is_none());
    }

    #[test]
    fn overlapping_periods_earliest_start_wins() {
        let docs = vec![doc_titled("x.md", "X", ymd(2023, 4, 10))];
        let periods = vec![
            period("Later", ymd(2023, 4, 1), ymd(2023, 4, 30)),
            period("Earlier", ymd(2023, 3, 1), ymd(2023, 4, 15)),
            period("Also Early", ymd(2023, 3, 1), ymd(2023, 5, 1)),
        ];
        let store = Store::from_documents(Path::new("/j"), docs, periods);
        // Same start date: name decides
        assert_eq!(store.documents()[0].period.as_deref(), Some("Also Early"));
        assert_eq!(store.periods()[2].name, "Later");
    }

    #[test]
    fn invalid_periods_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("periods.yaml");

        std::fs::write(&path, "Trip:\n  from: 2023-05-10\n  to: 2023-05-01\n").unwrap();
        assert!(matches!(load_periods(&path), Err(LoadError::Periods { .. })));

        std::fs::write(&path, "Trip:\n  from: soon\n  to: 2023-05-01\n").unwrap();
        assert!(matches!(load_periods(&path), Err(LoadError::Periods { .. })));

        std::fs::write(&path, "Trip: [not, a, map]\n").unwrap();
        assert!(matches!(load_periods(&path), Err(LoadError::Periods { .. })));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn sort_documents_newest_first_ties_by_path() {
        let docs = vec![
            doc_titled("b.md", "B", ymd(2023, 5, 1)),
            doc_titled("c.md", "C", ymd(2023, 6, 1)),
            doc_titled("a.md", "A", ymd(2023, 5, 1)),
        ];
        let mut store = Store::from_documents(Path::new("/j"), docs, Vec::new());
        store.sort_documents_by_date();
        assert_eq!(document_titles(store.documents()), vec!["C", "A", "B"]);
    }

    #[test]
    fn tag_catalogue_is_deduplicated_first_seen() {
        let mut a = doc_titled("a.md", "A", ymd(2023, 5, 1));
        a.tags = vec![Tag::new("Zoo", CATEGORY_GENERAL), Tag::new("Berlin", "location")];
        let mut b = doc_titled("b.md", "B", ymd(2023, 5, 2));
        b.tags = vec![Tag::new(" berlin ", CATEGORY_GENERAL), Tag::new("Ann", "people")];

        let mut store = Store::from_documents(Path::new("/j"), vec![a, b], Vec::new());
        let names: Vec<&str> = store.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Zoo", "Berlin", "Ann"]);

        store.sort_tags();
        let names: Vec<&str> = store.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Berlin", "Zoo"]);

        let groups = store.tags_by_category();
        assert_eq!(groups["location"].len(), 1);
        assert_eq!(groups["people"][0].name, "Ann");

        assert_eq!(store.documents_by_tag("BERLIN").len(), 2);
        assert_eq!(store.documents_by_tag("zoo").len(), 1);
        assert_eq!(store.documents_on_date(ymd(2023, 5, 2)).len(), 1);
    }
}
