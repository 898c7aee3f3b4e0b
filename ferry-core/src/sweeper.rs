//! Single-pass directory sweep.
//!
//! Failure policy:
//! - directory open or entry status failure aborts the pass (fail-fast);
//!   entries already renamed stay where they are
//! - rename failure is counted and logged, the pass continues

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::age_gate::{age_minutes, should_move};
use crate::error::SweepError;
use crate::types::{DirectoryEntry, SweepResult, Threshold, WatchedPair};

/// Source of inode status-change times.
pub trait StatusProbe {
    /// Status-change time of `path`, Unix seconds.
    fn status_changed_unix(&self, path: &Path) -> io::Result<i64>;
}

/// Reads `st_ctime` through `stat(2)` (symlinks are followed).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl StatusProbe for FsProbe {
    #[cfg(unix)]
    fn status_changed_unix(&self, path: &Path) -> io::Result<i64> {
        use std::os::unix::fs::MetadataExt;
        Ok(fs::metadata(path)?.ctime())
    }

    #[cfg(not(unix))]
    fn status_changed_unix(&self, path: &Path) -> io::Result<i64> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(unix_seconds(modified))
    }
}

/// Sweep `pair` against the wall clock and the real filesystem metadata.
pub fn sweep(pair: &WatchedPair, threshold: Threshold) -> Result<SweepResult, SweepError> {
    sweep_with(pair, threshold, &FsProbe)
}

/// Sweep `pair` against the wall clock with a caller-supplied status source.
pub fn sweep_with<P: StatusProbe + ?Sized>(
    pair: &WatchedPair,
    threshold: Threshold,
    probe: &P,
) -> Result<SweepResult, SweepError> {
    sweep_at(pair, threshold, unix_seconds(SystemTime::now()), probe)
}

/// Sweep `pair` with an explicit clock reading and status source.
pub fn sweep_at<P: StatusProbe + ?Sized>(
    pair: &WatchedPair,
    threshold: Threshold,
    now_unix: i64,
    probe: &P,
) -> Result<SweepResult, SweepError> {
    let entries = fs::read_dir(&pair.source).map_err(|source| SweepError::OpenDir {
        path: pair.source.clone(),
        source,
    })?;
    // Held for the whole pass so a vanished destination is caught before any
    // entry is inspected.
    let _destination = fs::read_dir(&pair.destination).map_err(|source| SweepError::OpenDir {
        path: pair.destination.clone(),
        source,
    })?;
    tracing::info!(
        source = %pair.source.display(),
        destination = %pair.destination.display(),
        direction = %pair.direction,
        "directory opened for sweep",
    );

    let mut result = SweepResult::default();
    for entry in entries {
        let entry = entry.map_err(|source| SweepError::ReadDir {
            path: pair.source.clone(),
            source,
        })?;
        let path = entry.path();
        let status_changed_unix = probe
            .status_changed_unix(&path)
            .map_err(|source| SweepError::Status {
                path: path.clone(),
                source,
            })?;
        let entry = DirectoryEntry {
            name: entry.file_name(),
            path,
            status_changed_unix,
        };
        result.scanned += 1;

        let age = age_minutes(now_unix, entry.status_changed_unix);
        tracing::debug!(path = %entry.path.display(), age_minutes = age, "entry age");
        if !should_move(age, threshold, pair.direction) {
            continue;
        }

        let target = pair.destination.join(&entry.name);
        match fs::rename(&entry.path, &target) {
            Ok(()) => {
                result.moved += 1;
                tracing::info!(
                    from = %entry.path.display(),
                    to = %target.display(),
                    age_minutes = age,
                    "entry moved",
                );
            }
            Err(err) => {
                result.failed += 1;
                tracing::error!(
                    path = %entry.path.display(),
                    target = %target.display(),
                    errno = err.raw_os_error().unwrap_or_default(),
                    error = %err,
                    "entry move failed",
                );
            }
        }
    }

    Ok(result)
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_secs()).unwrap_or(i64::MAX),
    }
}
