//! `ferry start` — single-instance check, detachment, poll loop.

use std::path::Path;

use anyhow::{Context, Result};

use ferry_core::Config;
use ferry_daemon::paths::{pid_file_path, CONFIG_FILE};
use ferry_daemon::{daemonize, init_tracing, start_blocking, DaemonError, PidFile};

pub fn run() -> Result<()> {
    let home = dirs::home_dir().ok_or(DaemonError::HomeNotFound)?;
    init_tracing(&home);

    // Read from the invocation directory, before detachment moves us to $HOME.
    let config = match Config::load(Path::new(CONFIG_FILE)) {
        Ok(config) => config.resolve_relative_to(&home),
        Err(err) => {
            tracing::warn!(error = %err, "no usable config, nothing to start");
            return Ok(());
        }
    };

    let pid_path = pid_file_path(&home);
    if PidFile::is_present(&pid_path) {
        tracing::info!(path = %pid_path.display(), "PID file exists, daemon already running");
        return Ok(());
    }

    let state = match daemonize(&home) {
        Ok(state) => state,
        Err(DaemonError::AlreadyRunning { path }) => {
            tracing::info!(path = %path.display(), "lost start race to another instance");
            return Ok(());
        }
        Err(err) => return Err(err).context("daemonization failed"),
    };

    start_blocking(state, config).context("daemon exited with error")
}
