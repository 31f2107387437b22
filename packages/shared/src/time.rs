//! Time utilities pinned to the service's `+09:00` offset, with a clock
//! abstraction for testability.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Offset every user-facing time is rendered in.
const SERVICE_OFFSET_SECS: i32 = 9 * 3600;

fn service_offset() -> FixedOffset {
    FixedOffset::east_opt(SERVICE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds
    fn now_millis(&self) -> i64;

    /// Current calendar date in the service offset
    fn today(&self) -> NaiveDate {
        date_of(self.now_millis())
    }
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

fn to_service_datetime(timestamp_millis: i64) -> DateTime<FixedOffset> {
    let utc = DateTime::<Utc>::from_timestamp_millis(timestamp_millis).unwrap_or_default();
    utc.with_timezone(&service_offset())
}

/// Convert a Unix timestamp (milliseconds) to RFC 3339 in the service offset
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    to_service_datetime(timestamp_millis).to_rfc3339()
}

/// Format a Unix timestamp (milliseconds) the way chat messages display it
///
/// Millisecond precision keeps stamps from the same connection strictly
/// ordered when they are compared as strings.
pub fn format_chat_time(timestamp_millis: i64) -> String {
    to_service_datetime(timestamp_millis)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Calendar date of a Unix timestamp (milliseconds) in the service offset
pub fn date_of(timestamp_millis: i64) -> NaiveDate {
    to_service_datetime(timestamp_millis).date_naive()
}
