//! CLI binary for docweave.
//!
//! A thin shim over the library crate: flags map onto `ServiceConfig`, and
//! each subcommand calls one service operation against the on-disk store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docweave::{
    CompositionRequest, DocWeave, DocumentId, IngestProgressCallback, PageReference, Partition, Rotation,
    ServiceConfig, Upload,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a progress bar over the batch and one line per file. Files
/// finish out of order, so lines carry their batch position.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);
        bar.set_style(style);
        bar.set_prefix("Ingesting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
    }

    fn on_file_complete(&self, index: usize, total_files: usize, name: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total_files,
            name,
            dim(&format!("{pages} pages")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total_files: usize, name: &str, reason: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total_files,
            name,
            red(reason),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, accepted: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} files ingested",
            if accepted == total_files { green("✔") } else { red("⚠") },
            bold(&accepted.to_string()),
            total_files
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest sources; prints one identifier per accepted file
  docweave ingest scan.pdf photo.png letter.docx

  # Page 2 of X rotated 90°, then page 1 of Y
  docweave compose --page X:1:90 --page Y:0 -o merged.pdf

  # Canonical PDF of an ingested source
  docweave preview X -o x.pdf

  # HTTP service with the background sweeper
  docweave serve --bind 0.0.0.0:5000

ENVIRONMENT VARIABLES:
  DOCWEAVE_STORE                   Store root directory
  DOCWEAVE_BIND                    Listen address for `serve`
  DOCWEAVE_SWEEP_INTERVAL_SECS     Seconds between sweeps (default 600)
  DOCWEAVE_MAX_AGE_SECS            Max age of every entry (default 1800)
  DOCWEAVE_INBOUND_MAX_AGE_SECS    Max age of ingested sources
  DOCWEAVE_OUTBOUND_MAX_AGE_SECS   Max age of composed outputs
  DOCWEAVE_CONVERSION_TIMEOUT_SECS DOCX conversion limit (default 120)
  DOCWEAVE_SOFFICE_PATH            LibreOffice executable (else PATH lookup)
  FRONTEND_URL                     Extra allowed CORS origin
"#;

/// Compose PDFs from pages of uploaded documents.
#[derive(Parser, Debug)]
#[command(
    name = "docweave",
    version,
    about = "Compose PDFs from pages of uploaded PDFs, images and DOCX files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Store root directory.
    #[arg(long, global = true, env = "DOCWEAVE_STORE")]
    store: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCWEAVE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCWEAVE_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service until interrupted.
    #[cfg(feature = "server")]
    Serve {
        /// Listen address.
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },

    /// Normalize and store source documents.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "DOCWEAVE_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Build a new document from page references.
    Compose {
        /// ID:INDEX[:ROTATION], 0-based index, rotation in {0, 90, 180, 270}.
        #[arg(long = "page", required = true, value_parser = parse_page_reference)]
        pages: Vec<PageReference>,

        /// Output name recorded in the store.
        #[arg(long, default_value = "document.pdf")]
        name: String,

        /// Also write the composed PDF here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the canonical PDF of an ingested source.
    Preview {
        id: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete expired entries from both partitions once.
    Sweep,
}

fn parse_page_reference(s: &str) -> std::result::Result<PageReference, String> {
    let mut parts = s.split(':');
    let (Some(id), Some(index)) = (parts.next(), parts.next()) else {
        return Err(format!("expected ID:INDEX[:ROTATION], got '{s}'"));
    };
    let rotation = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return Err(format!("expected ID:INDEX[:ROTATION], got '{s}'"));
    }

    let document_id = id.parse::<DocumentId>().map_err(|e| format!("{e}"))?;
    let page_index = index
        .parse()
        .map_err(|_| format!("page index must be a non-negative integer, got '{index}'"))?;
    let degrees: i64 = rotation
        .parse()
        .map_err(|_| format!("rotation must be an integer, got '{rotation}'"))?;
    let rotation = Rotation::try_from(degrees).map_err(|e| format!("{e}"))?;
    Ok(PageReference::new(document_id, page_index, rotation))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let service = DocWeave::new(config).context("Failed to open the document store")?;

    match cli.command {
        #[cfg(feature = "server")]
        Command::Serve { .. } => {
            if !office_auto::is_soffice_available() {
                tracing::warn!("No LibreOffice executable found; DOCX uploads will be rejected");
            }
            let token = tokio_util::sync::CancellationToken::new();
            let sweeper = service.start_sweeper(token.child_token());
            let service = std::sync::Arc::new(service);

            let shutdown = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, shutting down");
                }
                shutdown.cancel();
            });

            docweave::server::serve(service, token).await.context("HTTP server failed")?;
            sweeper.shutdown().await;
        }

        Command::Ingest {
            files,
            json,
            no_progress,
        } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {:?}", path))?;
                uploads.push(Upload::new(path.to_string_lossy(), bytes));
            }

            let show_progress = !cli.quiet && !no_progress && !json;
            let report = if show_progress {
                service.ingest_with_progress(uploads, &CliProgressCallback::new()).await
            } else {
                service.ingest(uploads).await
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else {
                for file in &report.files {
                    println!("{}\t{}\t{} pages", file.id, file.original_name, file.pages);
                }
                if !show_progress {
                    for rejected in &report.rejected {
                        eprintln!("{} {}: {}", red("✗"), rejected.original_name, rejected.reason);
                    }
                }
            }
            if report.files.is_empty() {
                bail!("No file was ingested");
            }
        }

        Command::Compose { pages, name, output } => {
            let outcome = service
                .compose(CompositionRequest {
                    pages,
                    output_name: name,
                })
                .await
                .context("Composition failed")?;

            for skipped in &outcome.skipped {
                eprintln!(
                    "{} reference #{} ({} page {}): {}",
                    red("✗"),
                    skipped.position,
                    skipped.document_id,
                    skipped.page_index,
                    skipped.reason
                );
            }
            if let Some(path) = output {
                let bytes = service
                    .retrieve(&outcome.handle.id.to_string(), &outcome.handle.filename)
                    .await?;
                tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} pages  →  {}",
                        green("✔"),
                        outcome.pages,
                        bold(&path.display().to_string())
                    );
                }
            }
            println!("{}\t{}", outcome.handle.id, outcome.handle.filename);
        }

        Command::Preview { id, output } => {
            let bytes = service.preview(&id).await.context("Preview failed")?;
            tokio::fs::write(&output, bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;
        }

        Command::Sweep => {
            let policy = service.config().sweep_policy();
            for partition in Partition::ALL {
                let report = service.store().sweep(partition, policy.max_age(partition)).await;
                if !cli.quiet {
                    eprintln!(
                        "{:<8}  removed {}  retained {}  failed {}",
                        partition, report.removed, report.retained, report.failed
                    );
                }
            }
        }
    }

    Ok(())
}

/// Environment first, then explicit flags.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .env_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment configuration")?;
    if let Some(ref root) = cli.store {
        builder = builder.store_root(root);
    }
    #[cfg(feature = "server")]
    if let Command::Serve { bind: Some(addr) } = cli.command {
        builder = builder.bind_addr(addr);
    }
    Ok(builder.build()?)
}
