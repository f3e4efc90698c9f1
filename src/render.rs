//! Concurrent rendering of entry pages.
//!
//! The dirty set is fanned out over a dedicated rayon pool. Each worker takes
//! one document, resolves its newer and older neighbour from the full,
//! read-only document list, produces the image variants the page needs, and
//! writes exactly one entry file. Entry names are a pure function of the
//! document, so no two workers write the same page.
//!
//! A failing document does not stop the batch: its error is recorded in the
//! [`RenderSummary`] and its previous output, if any, stays in place.
//!
//! ## Media
//!
//! ```text
//! gallery image  -> media/<id>.jpg        (display width)
//!                -> media/<id>-thumb.jpg  (thumbnail width)
//! preview        -> media/<id>-thumb.jpg  (thumbnail width)
//! body asset     -> media/<id>-full.<ext> (copied)
//! ```
//!
//! A variant is skipped when its output exists and is at least as new as its
//! source. Media ids depend only on the source file, so documents sharing a
//! directory can produce the same variant concurrently. Every variant is
//! written to a uniquely named staging file beside its target and renamed
//! into place, so readers only ever see a complete file and the last rename
//! wins. Thumbnails are scaled from `<gallery>/<thumbnail_directory>/<name>`
//! when such a file exists, otherwise from the image itself.

use crate::config::JournalConfig;
use crate::dirty::DirtySet;
use crate::generate::{self, GenerateError};
use crate::imaging::{BackendError, ImageBackend, Quality, ResizeParams};
use crate::naming;
use crate::types::{Document, Resource};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image {}: {source}", .path.display())]
    Imaging {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Everything a worker reads. Shared immutably by all workers.
pub struct RenderContext<'a> {
    /// All documents, newest first.
    pub documents: &'a [Document],
    pub output_dir: &'a Path,
    pub config: &'a JournalConfig,
    pub backend: &'a dyn ImageBackend,
}

/// Image variant work done for one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantCounts {
    pub written: usize,
    pub fresh: usize,
    pub copied: usize,
}

impl VariantCounts {
    fn add(&mut self, other: VariantCounts) {
        self.written += other.written;
        self.fresh += other.fresh;
        self.copied += other.copied;
    }
}

/// Progress events sent to the printer thread.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Rendered {
        title: String,
        output: String,
        variants: VariantCounts,
    },
    Failed {
        title: String,
        path: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub path: PathBuf,
    pub title: String,
    pub error: String,
}

/// Outcome of a render batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Entry files written, in dirty-set order.
    pub rendered: Vec<String>,
    pub failed: Vec<RenderFailure>,
    pub variants: VariantCounts,
}

impl RenderSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Render every dirty document on a pool of `threads` workers.
///
/// Returns after all workers have finished.
pub fn render_all(
    ctx: &RenderContext<'_>,
    dirty: &DirtySet,
    threads: usize,
    events: Option<Sender<RenderEvent>>,
) -> Result<RenderSummary, RenderError> {
    let media_dir = ctx.output_dir.join(naming::MEDIA_DIR);
    std::fs::create_dir_all(&media_dir).map_err(|source| RenderError::Io {
        path: media_dir.clone(),
        source,
    })?;

    let index_by_path: HashMap<&Path, usize> = ctx
        .documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.path.as_path(), i))
        .collect();
    let work: Vec<usize> = dirty
        .iter()
        .filter_map(|(path, _)| {
            let index = index_by_path.get(path).copied();
            if index.is_none() {
                warn!(path = %path.display(), "dirty document is not in the store");
            }
            index
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    debug!(documents = work.len(), threads, "rendering");

    let results: Vec<(usize, Result<Rendered, RenderError>)> = pool.install(|| {
        work.par_iter()
            .map(|&i| {
                let result = render_document(ctx, i);
                if let Some(tx) = &events {
                    let doc = &ctx.documents[i];
                    let event = match &result {
                        Ok(r) => RenderEvent::Rendered {
                            title: doc.title.clone(),
                            output: r.output.clone(),
                            variants: r.variants,
                        },
                        Err(e) => RenderEvent::Failed {
                            title: doc.title.clone(),
                            path: doc.path.clone(),
                            error: e.to_string(),
                        },
                    };
                    tx.send(event).ok();
                }
                (i, result)
            })
            .collect()
    });

    let mut summary = RenderSummary::default();
    for (i, result) in results {
        match result {
            Ok(r) => {
                summary.variants.add(r.variants);
                summary.rendered.push(r.output);
            }
            Err(e) => {
                let doc = &ctx.documents[i];
                warn!(path = %doc.path.display(), error = %e, "render failed");
                summary.failed.push(RenderFailure {
                    path: doc.path.clone(),
                    title: doc.title.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

/// Result of rendering one document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rendered {
    output: String,
    variants: VariantCounts,
}

/// Produce media and the entry page for `ctx.documents[index]`.
fn render_document(ctx: &RenderContext<'_>, index: usize) -> Result<Rendered, RenderError> {
    let doc = &ctx.documents[index];
    let newer = index.checked_sub(1).and_then(|i| ctx.documents.get(i));
    let older = ctx.documents.get(index + 1);

    let variants = render_media(ctx, doc)?;

    let output = naming::entry_file(doc);
    let page = generate::render_entry(&ctx.config.title, doc, newer, older);
    generate::write_page(ctx.output_dir, &output, &page.into_string())?;
    debug!(output = %output, "rendered entry");
    Ok(Rendered { output, variants })
}

fn render_media(ctx: &RenderContext<'_>, doc: &Document) -> Result<VariantCounts, RenderError> {
    let images = &ctx.config.images;
    let quality = Quality::new(images.quality);
    let mut counts = VariantCounts::default();

    for gallery in &doc.galleries {
        for image in &gallery.images {
            let display = scale(ctx, &image.path, &image.resource, images.display_width, quality)?;
            counts.add(display);
            if let Some(thumb) = &image.thumbnail {
                let source = thumbnail_source(&gallery.directory, &image.path, &ctx.config.gallery.thumbnail_directory);
                counts.add(scale(ctx, &source, thumb, images.thumbnail_width, quality)?);
            }
        }
    }

    if let Some(preview) = &doc.preview {
        counts.add(scale(ctx, &preview.source, &preview.resource, images.thumbnail_width, quality)?);
    }

    for asset in &doc.assets {
        let output = ctx.output_dir.join(&asset.resource.uri);
        if is_fresh(&asset.source, &output) {
            counts.fresh += 1;
            continue;
        }
        let staged = staging_path(&output);
        if let Err(source) = std::fs::copy(&asset.source, &staged) {
            std::fs::remove_file(&staged).ok();
            return Err(RenderError::Io {
                path: asset.source.clone(),
                source,
            });
        }
        publish(&staged, &output)?;
        counts.copied += 1;
    }
    Ok(counts)
}

fn scale(
    ctx: &RenderContext<'_>,
    source: &Path,
    resource: &Resource,
    max_width: u32,
    quality: Quality,
) -> Result<VariantCounts, RenderError> {
    let output = ctx.output_dir.join(&resource.uri);
    if is_fresh(source, &output) {
        return Ok(VariantCounts {
            fresh: 1,
            ..VariantCounts::default()
        });
    }
    let staged = staging_path(&output);
    let resized = ctx.backend.resize(&ResizeParams {
        source: source.to_path_buf(),
        output: staged.clone(),
        max_width,
        quality,
    });
    if let Err(e) = resized {
        std::fs::remove_file(&staged).ok();
        return Err(RenderError::Imaging {
            path: source.to_path_buf(),
            source: e,
        });
    }
    publish(&staged, &output)?;
    Ok(VariantCounts {
        written: 1,
        ..VariantCounts::default()
    })
}

static NEXT_STAGING: AtomicUsize = AtomicUsize::new(0);

/// `<dir>/.<n>-<name>`: a hidden sibling of `output`, unique within the
/// process. The extension is kept so encoders still see the target format.
fn staging_path(output: &Path) -> PathBuf {
    let n = NEXT_STAGING.fetch_add(1, Ordering::Relaxed);
    let name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{n}-{name}"))
}

/// Rename a finished staging file over `output`.
fn publish(staged: &Path, output: &Path) -> Result<(), RenderError> {
    std::fs::rename(staged, output).map_err(|source| {
        std::fs::remove_file(staged).ok();
        RenderError::Io {
            path: output.to_path_buf(),
            source,
        }
    })
}

/// Pre-made thumbnail for `image` if the gallery has one.
pub fn thumbnail_source(gallery_dir: &Path, image: &Path, thumbnail_dir: &str) -> PathBuf {
    if let Some(name) = image.file_name() {
        let candidate = gallery_dir.join(thumbnail_dir).join(name);
        if candidate.is_file() {
            return candidate;
        }
    }
    image.to_path_buf()
}

/// Output exists and is not older than its source.
fn is_fresh(source: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified());
    match (modified(source), modified(output)) {
        (Ok(src), Ok(out)) => out >= src,
        _ => false,
    }
}
