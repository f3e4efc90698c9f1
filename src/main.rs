use clap::{Parser, Subcommand};
use simple_journal::imaging::RustBackend;
use simple_journal::pipeline::{self, BuildOptions};
use simple_journal::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-journal")]
#[command(about = "Incremental static site generator for dated markdown journals")]
#[command(long_about = "\
Incremental static site generator for dated markdown journals

Every markdown file under the journal root is one entry. Its date comes from
front matter or from a YYYY-MM-DD prefix on the file or directory name.

Journal structure:

  journal/
  ├── config.toml                  # Site config (optional)
  ├── periods.yaml                 # Named date ranges (optional)
  └── 2023/
      └── lisbon/
          ├── entry.md             # ---\\ntitle: ...\\ndate: 2023-05-01\\n---
          ├── preview.jpg          # Index thumbnail (optional)
          ├── track.gpx            # Used by `:: map` blocks
          └── photos/              # Used by `:: gallery` blocks
              ├── thumbs/          # Pre-made thumbnails (optional)
              └── 001.jpg

Builds are incremental: only entries whose sources changed, or whose
newer/older neighbour changed, are rendered again. The previous build order
is kept in <output>/cache.json.

Run 'simple-journal gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Journal root directory
    #[arg(long, default_value = "journal", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Show debug diagnostics on stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render changed entries and rewrite indexes, tag and calendar pages
    Build {
        /// Render every entry, ignoring modification times
        #[arg(long)]
        clean: bool,
    },
    /// Load and validate the journal without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { clean } => {
            let options = BuildOptions {
                source: cli.source.clone(),
                output: cli.output.clone(),
                clean,
            };
            let backend = RustBackend::new();

            println!("==> Stage 1: Loading {}", options.source.display());
            let plan = pipeline::plan(&options, &backend)?;
            output::print_load_output(&plan.store);
            output::print_dirty_output(&plan.dirty, plan.store.documents().len());
            if plan.is_empty() {
                return Ok(());
            }

            println!("==> Stage 2: Rendering entries");
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_render_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let rendered = pipeline::render(&plan, &backend, Some(tx));
            printer.join().map_err(|_| "render output thread panicked")?;
            let summary = rendered?;

            println!("==> Stage 3: Writing pages \u{2192} {}", options.output.display());
            let finished = pipeline::finish(&plan, &summary)?;
            let report = pipeline::BuildReport {
                documents: plan.store.documents().len(),
                dirty: plan.dirty.clone(),
                summary: Some(summary),
                pages: finished.pages,
                cache_written: finished.cache_written,
            };
            output::print_build_report(&report);

            if !report.is_success() {
                return Err("some entries failed to render".into());
            }
            println!("==> Build complete: {}", options.output.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let (_, store) = pipeline::load(&cli.source, &RustBackend::new())?;
            output::print_load_output(&store);
            println!("==> Journal is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so they never interleave with the stage output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
