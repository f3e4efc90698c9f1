//! Build orchestration.
//!
//! ```text
//! plan:    config -> store (sorted) -> previous cache -> dirty set
//! render:  dirty set -> entry pages + media        (parallel)
//! finish:  derived pages -> cache.json
//! ```
//!
//! The three steps are public so the CLI can print a banner between them;
//! [`build`] runs them back to back. When the dirty set is empty the build
//! stops after planning and nothing in the output directory changes.

use crate::cache::BuildCache;
use crate::config::{self, ConfigError, JournalConfig};
use crate::dirty::{self, DirtyError, DirtySet};
use crate::generate::{self, GenerateError};
use crate::imaging::ImageBackend;
use crate::render::{self, RenderContext, RenderError, RenderEvent, RenderSummary};
use crate::store::{LoadError, Store};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Dirty check failed: {0}")]
    Dirty(#[from] DirtyError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Generate error: {0}")]
    Generate(#[from] GenerateError),
    #[error("Cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where to build from and to.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Render every document regardless of staleness.
    pub clean: bool,
}

/// Everything decided before rendering starts.
pub struct Plan {
    pub config: JournalConfig,
    /// Sorted newest first, tags by name.
    pub store: Store,
    pub output: PathBuf,
    pub dirty: DirtySet,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// What `finish` wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finished {
    pub pages: Vec<String>,
    pub cache_written: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub dirty: DirtySet,
    /// `None` when there was nothing to do.
    pub summary: Option<RenderSummary>,
    pub pages: Vec<String>,
    pub cache_written: bool,
}

impl BuildReport {
    /// No document failed to render.
    pub fn is_success(&self) -> bool {
        self.summary.as_ref().is_none_or(RenderSummary::is_success)
    }
}

/// Load the config and journal in canonical order.
pub fn load(source: &Path, backend: &dyn ImageBackend) -> Result<(JournalConfig, Store), BuildError> {
    let config = config::load_config(source)?;
    let started = Instant::now();
    let mut store = Store::load(source, &config, backend)?;
    store.sort_documents_by_date();
    store.sort_tags();
    debug!(
        documents = store.documents().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "journal loaded"
    );
    Ok((config, store))
}

/// Load everything and decide which entry pages need rendering.
pub fn plan(options: &BuildOptions, backend: &dyn ImageBackend) -> Result<Plan, BuildError> {
    let (config, store) = load(&options.source, backend)?;

    std::fs::create_dir_all(&options.output).map_err(|source| BuildError::OutputDir {
        path: options.output.clone(),
        source,
    })?;

    let previous = BuildCache::load(&options.output);
    let dirty = dirty::compute(store.documents(), &previous, &options.output, options.clean)?;
    info!(
        documents = store.documents().len(),
        cached = previous.len(),
        dirty = dirty.len(),
        "build planned"
    );

    Ok(Plan {
        config,
        store,
        output: options.output.clone(),
        dirty,
    })
}

/// Render the dirty entry pages. Blocks until every worker is done.
pub fn render(
    plan: &Plan,
    backend: &dyn ImageBackend,
    events: Option<Sender<RenderEvent>>,
) -> Result<RenderSummary, BuildError> {
    let ctx = RenderContext {
        documents: plan.store.documents(),
        output_dir: &plan.output,
        config: &plan.config,
        backend,
    };
    let threads = config::effective_threads(&plan.config.processing);
    let started = Instant::now();
    let summary = render::render_all(&ctx, &plan.dirty, threads, events)?;
    info!(
        rendered = summary.rendered.len(),
        failed = summary.failed.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "render finished"
    );
    Ok(summary)
}

/// Write derived pages and the new cache.
///
/// Documents that failed to render are left out of the cache, so the next
/// build sees them as new and re-renders them and their neighbours.
pub fn finish(plan: &Plan, summary: &RenderSummary) -> Result<Finished, BuildError> {
    let pages = generate::write_derived_pages(&plan.store, &plan.output, &plan.config.title)?;

    let failed: HashSet<&Path> = summary.failed.iter().map(|f| f.path.as_path()).collect();
    let rendered: Vec<_> = plan
        .store
        .documents()
        .iter()
        .filter(|d| !failed.contains(d.path.as_path()))
        .cloned()
        .collect();
    let cache = BuildCache::from_documents(&rendered);
    let cache_written = match cache.save(&plan.output) {
        Ok(()) => true,
        Err(e) => {
            warn!(output = %plan.output.display(), error = %e, "could not write build cache");
            false
        }
    };

    Ok(Finished { pages, cache_written })
}

/// Run a whole incremental build.
pub fn build(
    options: &BuildOptions,
    backend: &dyn ImageBackend,
    events: Option<Sender<RenderEvent>>,
) -> Result<BuildReport, BuildError> {
    let plan = plan(options, backend)?;
    if plan.is_empty() {
        info!("nothing to do");
        return Ok(BuildReport {
            documents: plan.store.documents().len(),
            dirty: plan.dirty,
            summary: None,
            pages: Vec::new(),
            cache_written: false,
        });
    }

    let summary = render(&plan, backend, events)?;
    let finished = finish(&plan, &summary)?;
    Ok(BuildReport {
        documents: plan.store.documents().len(),
        dirty: plan.dirty,
        summary: Some(summary),
        pages: finished.pages,
        cache_written: finished.cache_written,
    })
}
