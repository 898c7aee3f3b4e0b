//! Error types for ferry-core.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Conditions that abort a single sweep pass.
///
/// Rename failures are not represented here: they are recorded per entry in
/// [`crate::SweepResult`] and never abort the pass.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The source or destination directory could not be opened.
    #[error("cannot open directory {path}: {source}")]
    OpenDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the next entry from the source directory failed.
    #[error("cannot read entries of {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Status of an entry could not be queried.
    #[error("cannot query status of {path}: {source}")]
    Status {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    /// Path the failing operation was applied to.
    pub fn path(&self) -> &Path {
        match self {
            SweepError::OpenDir { path, .. }
            | SweepError::ReadDir { path, .. }
            | SweepError::Status { path, .. } => path,
        }
    }

    /// Raw OS error code, when the failure came from a system call.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            SweepError::OpenDir { source, .. }
            | SweepError::ReadDir { source, .. }
            | SweepError::Status { source, .. } => source.raw_os_error(),
        }
    }
}

/// All errors that can arise while loading the plain-text configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is missing the {0} field")]
    MissingField(&'static str),

    #[error("config field {field} is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// Poll interval below [`crate::config::MIN_POLL_INTERVAL`].
    #[error("poll interval of {seconds}s is below the 1s minimum")]
    IntervalTooShort { seconds: u64 },
}
