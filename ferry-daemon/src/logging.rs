//! Tracing setup for the `ferry` binary.
//!
//! Events go to the systemd journal when its socket is reachable and are
//! always appended to `~/.ferry/logs/ferry.log`, which keeps working after the
//! standard streams are pointed at `/dev/null`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::paths::{log_path, logs_dir};

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(home: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let journald = tracing_journald::layer().ok();
    let file_layer = open_log_file(home).ok().map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(file_layer)
        .try_init();
}

fn open_log_file(home: &Path) -> io::Result<File> {
    fs::create_dir_all(logs_dir(home))?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(home))
}
