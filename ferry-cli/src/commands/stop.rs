//! `ferry stop` — signal the instance recorded in the PID file.

use anyhow::Result;

use ferry_daemon::paths::pid_file_path;
use ferry_daemon::{init_tracing, stop, StopOutcome};

/// Every outcome is a successful exit; a missing or unusable PID file just
/// means there is nothing to stop.
pub fn run() -> Result<()> {
    let Some(home) = dirs::home_dir() else {
        return Ok(());
    };
    init_tracing(&home);

    match stop(&pid_file_path(&home)) {
        Ok(StopOutcome::NotRunning) => tracing::info!("daemon is not running"),
        Ok(StopOutcome::Signalled { pid }) => tracing::info!(pid, "termination signal sent"),
        Ok(StopOutcome::StaleRemoved { pid }) => {
            tracing::info!(pid, "daemon was not running, stale PID file removed");
        }
        Err(err) => tracing::warn!(
            errno = err.os_code().unwrap_or_default(),
            error = %err,
            "nothing stopped",
        ),
    }
    Ok(())
}
