//! Plain-text run configuration.
//!
//! The file holds whitespace-separated tokens, in order:
//!
//! ```text
//! <source dir> <destination dir> <poll interval seconds> [threshold minutes]
//! ```
//!
//! Tokens past the fourth are ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{Direction, Threshold, WatchedPair};

/// Shortest accepted pause between poll cycles.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub poll_interval: Duration,
    pub threshold: Threshold,
}

impl Config {
    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    /// Anchor relative directory paths at `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.source.is_relative() {
            self.source = base.join(&self.source);
        }
        if self.destination.is_relative() {
            self.destination = base.join(&self.destination);
        }
        self
    }

    /// The two complementary passes of a poll cycle: young entries flow from
    /// source to destination, old entries flow back.
    pub fn watched_pairs(&self) -> [WatchedPair; 2] {
        [
            WatchedPair::new(&self.source, &self.destination, Direction::NewerThan),
            WatchedPair::new(&self.destination, &self.source, Direction::OlderThan),
        ]
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let source = tokens.next().ok_or(ConfigError::MissingField("source"))?;
        let destination = tokens
            .next()
            .ok_or(ConfigError::MissingField("destination"))?;
        let interval = tokens
            .next()
            .ok_or(ConfigError::MissingField("poll_interval"))?;
        let seconds = parse_number::<u64>("poll_interval", interval)?;
        let poll_interval = Duration::from_secs(seconds);
        if poll_interval < MIN_POLL_INTERVAL {
            return Err(ConfigError::IntervalTooShort { seconds });
        }
        let threshold = match tokens.next() {
            Some(raw) => Threshold(parse_number::<u32>("threshold", raw)?),
            None => Threshold::DEFAULT,
        };

        Ok(Self {
            source: PathBuf::from(source),
            destination: PathBuf::from(destination),
            poll_interval,
            threshold,
        })
    }
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}
