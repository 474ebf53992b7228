//! Sweep error types.

use std::path::PathBuf;

/// Errors that can occur while preparing or running a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// The sweep configuration is unusable.
    #[error("invalid sweep configuration: {detail}")]
    InvalidConfig { detail: String },

    /// A bit-width range string could not be parsed.
    #[error("invalid bit range '{input}': expected START..END or START..=END")]
    InvalidRange { input: String },

    /// Template file does not exist.
    #[error("template file not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// Template file is not valid UTF-8 text.
    #[error("template file is not valid UTF-8: {}", path.display())]
    TemplateEncoding { path: PathBuf },

    /// Reading, writing or swapping the template failed.
    #[error("template I/O error at {}: {source}", path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The build output to archive does not exist.
    #[error("build output missing: {}", path.display())]
    ArchiveSourceMissing { path: PathBuf },

    /// The build output changed after the build handle was taken.
    #[error("build output {} no longer matches its build handle: expected {expected}, found {actual}", path.display())]
    ArchiveSourceChanged {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Copying the build output to its archive path failed.
    #[error("failed to archive {} to {}: {source}", from.display(), to.display())]
    ArchiveCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive directory could not be created.
    #[error("cannot create archive directory {}: {source}", path.display())]
    ArchiveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
