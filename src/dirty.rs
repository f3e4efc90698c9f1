//! Dirty set: which entry pages a build has to render.
//!
//! Two independent checks feed one set:
//!
//! 1. **Staleness**: the document's own sources changed. The newest
//!    modification time in the document directory's subtree is compared with
//!    the entry file's; a missing entry file or a `--clean` build is always
//!    stale.
//! 2. **Neighbour propagation**: every entry page links to the next newer and
//!    next older entry. When the document order around a page changes, the
//!    page must be rendered again even though its sources did not change.
//!
//! Propagation compares the new order with the previous build's
//! [`BuildCache`] position by position. For each document at new index `i`
//! and old index `j`:
//!
//! ```text
//! not in old cache                          -> dirty (new)
//! (i == 0) != (j == 0)                      -> dirty (gained/lost newest slot)
//! new[i-1].output != old[j-1].output        -> dirty (newer neighbour changed)
//! (i == last) != (j == last_old)            -> dirty (gained/lost oldest slot)
//! new[i+1].output != old[j+1].output        -> dirty (older neighbour changed)
//! ```
//!
//! Exotic reorderings can over-mark but never under-mark.

use crate::cache::BuildCache;
use crate::naming;
use crate::types::Document;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DirtyError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Why a document is in the dirty set. The first reason found is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// `--clean` build.
    Forced,
    /// No entry file in the output directory.
    Missing,
    /// Sources newer than the entry file.
    Modified,
    /// Not in the previous build.
    New,
    /// Neighbour links changed.
    Neighbour,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::Forced => "forced",
            Reason::Missing => "missing",
            Reason::Modified => "modified",
            Reason::New => "new",
            Reason::Neighbour => "neighbour",
        };
        f.write_str(s)
    }
}

/// Documents to render, keyed and ordered by source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    entries: BTreeMap<PathBuf, Reason>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. An already present document keeps its first reason.
    pub fn insert(&mut self, path: impl Into<PathBuf>, reason: Reason) {
        self.entries.entry(path.into()).or_insert(reason);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn reason(&self, path: &Path) -> Option<Reason> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, Reason)> {
        self.entries.iter().map(|(p, r)| (p.as_path(), *r))
    }

    /// Count per reason, in declaration order, zero counts omitted.
    pub fn reason_counts(&self) -> Vec<(Reason, usize)> {
        [
            Reason::Forced,
            Reason::Missing,
            Reason::Modified,
            Reason::New,
            Reason::Neighbour,
        ]
        .into_iter()
        .map(|r| (r, self.entries.values().filter(|v| **v == r).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

/// Union of neighbour propagation and staleness.
///
/// Propagation runs first, so a document absent from the previous build is
/// reported as new rather than as missing its output.
///
/// `documents` must already be in date-descending order.
pub fn compute(
    documents: &[Document],
    previous: &BuildCache,
    output_dir: &Path,
    clean: bool,
) -> Result<DirtySet, DirtyError> {
    let mut dirty = DirtySet::new();
    let next = BuildCache::from_documents(documents);
    for (i, reason) in propagate(previous, &next) {
        dirty.insert(&next.documents[i].path, reason);
    }
    for doc in documents {
        if let Some(reason) = staleness(doc, output_dir, clean)? {
            dirty.insert(&doc.path, reason);
        }
    }
    Ok(dirty)
}

/// Indices into `next` whose neighbour links differ from `previous`.
pub fn propagate(previous: &BuildCache, next: &BuildCache) -> Vec<(usize, Reason)> {
    let old = &previous.documents;
    let new = &next.documents;
    let mut marked = Vec::new();

    for (i, entry) in new.iter().enumerate() {
        let Some(j) = previous.position(&entry.path) else {
            marked.push((i, Reason::New));
            continue;
        };

        if (i == 0) != (j == 0) {
            marked.push((i, Reason::Neighbour));
            continue;
        }
        if i > 0 && j > 0 && new[i - 1].output_path != old[j - 1].output_path {
            marked.push((i, Reason::Neighbour));
            continue;
        }
        if (i + 1 == new.len()) != (j + 1 == old.len()) {
            marked.push((i, Reason::Neighbour));
            continue;
        }
        if i + 1 < new.len() && j + 1 < old.len() && new[i + 1].output_path != old[j + 1].output_path {
            marked.push((i, Reason::Neighbour));
        }
    }
    marked
}

/// Whether a document's own sources require rendering.
pub fn staleness(doc: &Document, output_dir: &Path, clean: bool) -> Result<Option<Reason>, DirtyError> {
    if clean {
        return Ok(Some(Reason::Forced));
    }
    let entry_file = output_dir.join(naming::entry_file(doc));
    let output_time = match modified(&entry_file) {
        Ok(t) => t,
        Err(DirtyError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            return Ok(Some(Reason::Missing));
        }
        Err(e) => return Err(e),
    };
    let source_time = subtree_modified(doc.directory())?;
    Ok((source_time > output_time).then_some(Reason::Modified))
}

fn modified(path: &Path) -> Result<SystemTime, DirtyError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| DirtyError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Newest modification time of `dir` and everything below it.
pub fn subtree_modified(dir: &Path) -> Result<SystemTime, DirtyError> {
    let mut newest = SystemTime::UNIX_EPOCH;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let time = entry
            .metadata()?
            .modified()
            .map_err(|source| DirtyError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
        newest = newest.max(time);
    }
    Ok(newest)
}
