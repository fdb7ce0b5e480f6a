//! # office-auto
//!
//! Discover a [LibreOffice](https://www.libreoffice.org/) installation and use
//! it to convert office documents (DOCX, ODT, RTF, …) into PDF, headlessly and
//! with a hard timeout.
//!
//! ## How it works
//!
//! On [`OfficeRenderer::discover`]:
//!
//! 1. Checks `DOCWEAVE_SOFFICE_PATH` for an explicit executable.
//! 2. Searches `$PATH` for `soffice`, `libreoffice` and `lowriter`.
//! 3. Falls back to the well-known install locations per platform.
//!
//! [`OfficeRenderer::convert_to_pdf`] then writes the input into a scratch
//! directory, runs
//! `soffice --headless --norestore --convert-to pdf --outdir <dir> <input>`
//! with a private user profile (so concurrent conversions never fight over
//! `~/.config/libreoffice`), and reads the produced PDF back.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use office_auto::OfficeRenderer;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), office_auto::OfficeError> {
//! let renderer = OfficeRenderer::discover(Duration::from_secs(60))?;
//! let docx = std::fs::read("letter.docx").unwrap();
//! let pdf = renderer.convert_to_pdf(&docx, "docx").await?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `DOCWEAVE_SOFFICE_PATH` — path to an existing `soffice` executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit `soffice` executable.
pub const SOFFICE_PATH_ENV: &str = "DOCWEAVE_SOFFICE_PATH";

/// Executable names searched on `$PATH`, in order.
const EXECUTABLES: [&str; 3] = ["soffice", "libreoffice", "lowriter"];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by office-auto operations.
#[derive(Error, Debug)]
pub enum OfficeError {
    /// No LibreOffice executable could be found.
    #[error("LibreOffice (soffice) not found; install it or set {SOFFICE_PATH_ENV}")]
    NotInstalled,

    /// The executable exists but could not be started.
    #[error("Failed to start '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The conversion did not finish in time; the child process was killed.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// `soffice` exited unsuccessfully.
    #[error("soffice exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// `soffice` exited successfully but wrote no PDF.
    #[error("soffice produced no output: {stderr}")]
    NoOutput { stderr: String },

    /// Scratch directory I/O failed.
    #[error("Scratch I/O error: {0}")]
    Io(#[source] std::io::Error),
}

// ── Discovery ────────────────────────────────────────────────────────────────

static DISCOVERED: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Returns the path of a usable `soffice` executable, if any.
///
/// The environment override is consulted on every call; the `$PATH` search
/// runs once per process and is cached.
pub fn locate_soffice() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(SOFFICE_PATH_ENV) {
        let pb = PathBuf::from(p);
        if pb.is_file() {
            return Some(pb);
        }
        warn!(
            "{} '{}' does not exist; searching PATH instead",
            SOFFICE_PATH_ENV,
            pb.display()
        );
    }

    DISCOVERED.get_or_init(search_installations).clone()
}

/// Returns `true` when [`locate_soffice`] finds an executable.
pub fn is_soffice_available() -> bool {
    locate_soffice().is_some()
}

fn search_installations() -> Option<PathBuf> {
    for exe in EXECUTABLES {
        if let Ok(path) = which::which(exe) {
            debug!("Found {} at {}", exe, path.display());
            return Some(path);
        }
    }

    well_known_locations().into_iter().find(|p| p.is_file())
}

fn well_known_locations() -> Vec<PathBuf> {
    match std::env::consts::OS {
        "macos" => vec![PathBuf::from(
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        )],
        "windows" => vec![
            PathBuf::from(r"C:\Program Files\LibreOffice\program\soffice.exe"),
            PathBuf::from(r"C:\Program Files (x86)\LibreOffice\program\soffice.exe"),
        ],
        _ => vec![
            PathBuf::from("/usr/lib/libreoffice/program/soffice"),
            PathBuf::from("/opt/libreoffice/program/soffice"),
            PathBuf::from("/snap/bin/libreoffice"),
        ],
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// A discovered `soffice` executable plus the conversion time budget.
#[derive(Debug, Clone)]
pub struct OfficeRenderer {
    soffice: PathBuf,
    timeout: Duration,
}

impl OfficeRenderer {
    /// Locate `soffice` (see [`locate_soffice`]).
    pub fn discover(timeout: Duration) -> Result<Self, OfficeError> {
        let soffice = locate_soffice().ok_or(OfficeError::NotInstalled)?;
        info!("Using LibreOffice at {}", soffice.display());
        Ok(Self::with_path(soffice, timeout))
    }

    /// Use an explicit executable without any discovery.
    pub fn with_path(soffice: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            soffice: soffice.into(),
            timeout,
        }
    }

    /// Path of the executable this renderer runs.
    pub fn executable(&self) -> &Path {
        &self.soffice
    }

    /// Convert `input` (a document whose type is given by `extension`, e.g.
    /// `"docx"`) to PDF bytes.
    ///
    /// The child process is killed if the timeout elapses or the returned
    /// future is dropped.
    pub async fn convert_to_pdf(&self, input: &[u8], extension: &str) -> Result<Vec<u8>, OfficeError> {
        let scratch = tempfile::Builder::new()
            .prefix("office-auto-")
            .tempdir()
            .map_err(OfficeError::Io)?;
        let input_path = scratch.path().join(format!("input.{extension}"));
        let out_dir = scratch.path().join("out");
        let profile_dir = scratch.path().join("profile");

        tokio::fs::write(&input_path, input)
            .await
            .map_err(OfficeError::Io)?;
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(OfficeError::Io)?;

        let mut cmd = tokio::process::Command::new(&self.soffice);
        cmd.arg(format!("-env:UserInstallation={}", file_url(&profile_dir)))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(&out_dir)
            .arg(&input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Running {} on {} ({} bytes)",
            self.soffice.display(),
            input_path.display(),
            input.len()
        );

        let child = cmd.spawn().map_err(|e| OfficeError::Spawn {
            path: self.soffice.clone(),
            source: e,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(OfficeError::Io)?,
            Err(_) => {
                warn!("soffice exceeded {:?}; killing", self.timeout);
                return Err(OfficeError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(OfficeError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let pdf_path = out_dir.join("input.pdf");
        match tokio::fs::read(&pdf_path).await {
            Ok(bytes) => {
                debug!("soffice wrote {} bytes", bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OfficeError::NoOutput { stderr }),
            Err(e) => Err(OfficeError::Io(e)),
        }
    }
}

/// `file://` URL for a local path, as LibreOffice expects for
/// `-env:UserInstallation`.
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
