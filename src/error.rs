//! Error type shared by every stage of the report pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors that abort a pipeline stage.
///
/// Recoverable conditions (a missing artifact, an unavailable converter) never surface as a
/// `ReportError`; they are logged and degraded at the call site instead.
#[derive(Debug)]
pub enum ReportError {
    /// A filesystem operation failed on the given path.
    Io {
        /// Path that was being read, written or created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The run configuration could not be loaded or failed validation.
    Config(String),
    /// The configuration file is not valid TOML for [`crate::config::RunConfig`].
    Toml(toml::de::Error),
    /// An image could not be encoded or decoded.
    Image(image::ImageError),
    /// Writing the CSV table failed.
    Csv(csv::Error),
    /// A caller supplied data that violates a documented precondition.
    InvalidInput(String),
}

impl ReportError {
    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            Self::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Toml(err) => write!(f, "Failed to parse configuration file: {err}"),
            Self::Image(err) => write!(f, "Image encoding failed: {err}"),
            Self::Csv(err) => write!(f, "CSV output failed: {err}"),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Toml(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Config(_) | Self::InvalidInput(_) => None,
        }
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err)
    }
}

impl From<image::ImageError> for ReportError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads `path` to a string, attaching the path to any failure.
pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| ReportError::io(path, err))
}

/// Writes `contents` to `path`, attaching the path to any failure.
pub(crate) fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, contents).map_err(|err| ReportError::io(path, err))
}

/// Creates `path` and all missing parents. Succeeds if the directory already exists.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|err| ReportError::io(path, err))
}
