//! ferry core library — age gate, directory sweeper, configuration, errors.
//!
//! - [`types`] — directions, thresholds, watched pairs, sweep counters
//! - [`age_gate`] — the strict-inequality move decision
//! - [`sweeper`] — one fail-fast pass over a source directory
//! - [`config`] — the plain-text run configuration
//! - [`error`] — [`SweepError`], [`ConfigError`]

pub mod age_gate;
pub mod config;
pub mod error;
pub mod sweeper;
pub mod types;

pub use age_gate::{age_minutes, should_move};
pub use config::{Config, MIN_POLL_INTERVAL};
pub use error::{ConfigError, SweepError};
pub use sweeper::{sweep, sweep_at, sweep_with, FsProbe, StatusProbe};
pub use types::{Direction, DirectoryEntry, SweepResult, Threshold, WatchedPair};
