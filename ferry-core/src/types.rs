//! Domain types shared by the sweeper and the daemon.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Direction / Threshold
// ---------------------------------------------------------------------------

/// Which inequality decides relocation for a sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Move entries whose age is strictly greater than the threshold.
    OlderThan,
    /// Move entries whose age is strictly less than the threshold.
    NewerThan,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::OlderThan => "older-than",
            Direction::NewerThan => "newer-than",
        };
        f.write_str(s)
    }
}

/// Age threshold in whole minutes, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Threshold(pub u32);

impl Threshold {
    /// Threshold used when the config file does not carry one.
    pub const DEFAULT: Threshold = Threshold(2);

    pub fn minutes(self) -> i64 {
        i64::from(self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

// ---------------------------------------------------------------------------
// WatchedPair
// ---------------------------------------------------------------------------

/// One directed sweep: entries flow from `source` into `destination` when
/// they satisfy `direction` against the run's threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPair {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub direction: Direction,
}

impl WatchedPair {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        direction: Direction,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            direction,
        }
    }

    /// Short human label used in log lines, e.g. `inbox -> archive (older-than)`.
    pub fn label(&self) -> String {
        format!(
            "{} -> {} ({})",
            self.source.display(),
            self.destination.display(),
            self.direction
        )
    }
}

// ---------------------------------------------------------------------------
// DirectoryEntry / SweepResult
// ---------------------------------------------------------------------------

/// A source directory entry as seen by a single sweep iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: OsString,
    pub path: PathBuf,
    /// Inode status-change time, Unix seconds.
    pub status_changed_unix: i64,
}

/// Counters reported by a completed sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepResult {
    pub scanned: usize,
    pub moved: usize,
    pub failed: usize,
}
