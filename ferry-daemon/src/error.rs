use std::fmt;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// OS-level step of the service lifecycle that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    FirstFork,
    CreateSession,
    SecondFork,
    ChangeDirectory,
    RedirectStdin,
    RedirectStdout,
    RedirectStderr,
    InstallSignalHandler,
    SignalDaemon,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleStage::FirstFork => "first fork",
            LifecycleStage::CreateSession => "session creation",
            LifecycleStage::SecondFork => "second fork",
            LifecycleStage::ChangeDirectory => "working directory change",
            LifecycleStage::RedirectStdin => "stdin redirect",
            LifecycleStage::RedirectStdout => "stdout redirect",
            LifecycleStage::RedirectStderr => "stderr redirect",
            LifecycleStage::InstallSignalHandler => "termination handler install",
            LifecycleStage::SignalDaemon => "termination signal delivery",
        };
        f.write_str(s)
    }
}

/// Error surface for daemonization, PID file handling and the poll runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} failed: {source}")]
    Os {
        stage: LifecycleStage,
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle step that failed on a specific path.
    #[error("{stage} failed at {path}: {source}")]
    OsPath {
        stage: LifecycleStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sweep aborted: {0}")]
    Sweep(#[from] ferry_core::SweepError),

    #[error("PID file {path} does not hold a valid process id: {contents:?}")]
    InvalidPid { path: PathBuf, contents: String },

    /// Another instance created the PID file first.
    #[error("another instance already holds {path}")]
    AlreadyRunning { path: PathBuf },

    #[error("cannot determine home directory; set $HOME")]
    HomeNotFound,

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl DaemonError {
    /// Raw OS error code behind this failure, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            DaemonError::Io { source, .. }
            | DaemonError::Os { source, .. }
            | DaemonError::OsPath { source, .. } => {
                source.raw_os_error()
            }
            DaemonError::Sweep(err) => err.os_code(),
            _ => None,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn os_err(stage: LifecycleStage, errno: Errno) -> DaemonError {
    DaemonError::Os {
        stage,
        source: errno.into(),
    }
}
