//! Spaced-repetition scheduling math.
//!
//! Review intervals double per consecutive pass, starting at one hour and
//! capped at 180 days. A blunder is due when its priority exceeds 1.0.

use chrono::{DateTime, Utc};

pub const BASE_INTERVAL_HOURS: f64 = 1.0;
pub const BACKOFF_FACTOR: f64 = 2.0;
pub const MAX_INTERVAL_HOURS: f64 = 4320.0;

pub fn expected_interval_hours(pass_streak: i32) -> f64 {
    let interval = BASE_INTERVAL_HOURS * BACKOFF_FACTOR.powi(pass_streak.max(0));
    interval.min(MAX_INTERVAL_HOURS)
}

/// Overdue ratio: hours since the last review (or creation, for a fresh
/// blunder) divided by the expected interval at the current streak.
/// Returns 0 when no reference timestamp exists.
pub fn calculate_priority(
    pass_streak: i32,
    last_reviewed_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let reference = match last_reviewed_at.or(created_at) {
        Some(t) => t,
        None => return 0.0,
    };

    let hours_since = ((now - reference).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    hours_since / expected_interval_hours(pass_streak)
}
