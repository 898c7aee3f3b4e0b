//! Move decision for a single entry.
//!
//! Both directions use strict inequalities: an entry whose age equals the
//! threshold never moves, in either direction.

use crate::types::{Direction, Threshold};

/// Whole minutes elapsed between `status_changed_unix` and `now_unix`,
/// rounded toward negative infinity.
pub fn age_minutes(now_unix: i64, status_changed_unix: i64) -> i64 {
    now_unix.saturating_sub(status_changed_unix).div_euclid(60)
}

/// Decide whether an entry of the given age moves under `direction`.
pub fn should_move(age_minutes: i64, threshold: Threshold, direction: Direction) -> bool {
    match direction {
        Direction::OlderThan => age_minutes > threshold.minutes(),
        Direction::NewerThan => age_minutes < threshold.minutes(),
    }
}
