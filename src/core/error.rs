use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer.
/// Every module returns `Result<T, InstallerError>`.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Network access required for {url} but the installer is running offline")]
    OfflineBlocked { url: String },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("ETag mismatch for {path:?}: expected {expected}, got {actual}")]
    EtagMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Parsing ─────────────────────────────────────────
    #[error("Invalid artifact coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Processors ──────────────────────────────────────
    #[error("Missing token {key:?} in {template:?}")]
    MissingToken { key: String, template: String },

    #[error("Processor {tool} is missing dependency {path:?}")]
    MissingDependency { tool: String, path: PathBuf },

    #[error("Processor {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    // ── Libraries ───────────────────────────────────────
    #[error("These libraries failed to download: {}", .0.join(", "))]
    LibrariesFailed(Vec<String>),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Offline bundle failed: {0}")]
    Packaging(String),

    // ── Generic ─────────────────────────────────────────
    #[error("Installation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallerResult<T> = Result<T, InstallerError>;

impl InstallerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            path: path.into(),
            source,
        }
    }
}
