//! Throughput and completion estimates derived from the transfer counters

use chrono::TimeZone;

/// Read-only view of the transfer state at one point in time
///
/// Times are whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes_transferred: u64,
    pub start: i64,
    pub now: i64,
    /// Expected stream length, `None` when unknown
    pub expected_total: Option<u64>,
}

/// Values computed from a [`Snapshot`], recomputed on every redisplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub elapsed_secs: u64,
    /// Average bytes per second, `None` until a full second has passed
    pub rate: Option<u64>,
    /// Linear estimate of seconds left, `None` without a total or before the first byte
    pub remaining_secs: Option<u64>,
    /// Estimated completion time of day
    pub eta: Option<chrono::DateTime<chrono::Local>>,
}

#[must_use]
pub fn elapsed_secs(snapshot: &Snapshot) -> u64 {
    u64::try_from(snapshot.now.saturating_sub(snapshot.start)).unwrap_or(0)
}

#[must_use]
pub fn rate(bytes: u64, elapsed_secs: u64) -> Option<u64> {
    if elapsed_secs == 0 {
        return None;
    }
    Some(bytes / elapsed_secs)
}

/// Extrapolates the average rate so far over the bytes still expected.
///
/// Overshooting the expected total yields zero rather than a negative estimate.
#[must_use]
pub fn remaining_secs(bytes: u64, expected_total: Option<u64>, elapsed_secs: u64) -> Option<u64> {
    let total = expected_total.filter(|&total| total > 0)?;
    if bytes == 0 {
        return None;
    }
    let left = total.saturating_sub(bytes) as f64;
    let estimate = left * elapsed_secs as f64 / bytes as f64;
    // float-to-int casts saturate, truncation matches integer second granularity
    Some(estimate as u64)
}

#[must_use]
pub fn eta(now: i64, remaining_secs: u64) -> Option<chrono::DateTime<chrono::Local>> {
    let remaining = i64::try_from(remaining_secs).ok()?;
    let when = now.checked_add(remaining)?;
    chrono::Local.timestamp_opt(when, 0).single()
}

impl Metrics {
    #[must_use]
    pub fn compute(snapshot: &Snapshot) -> Self {
        let elapsed_secs = elapsed_secs(snapshot);
        let remaining_secs = remaining_secs(
            snapshot.bytes_transferred,
            snapshot.expected_total,
            elapsed_secs,
        );
        Self {
            elapsed_secs,
            rate: rate(snapshot.bytes_transferred, elapsed_secs),
            remaining_secs,
            eta: remaining_secs.and_then(|remaining| eta(snapshot.now, remaining)),
        }
    }
}
