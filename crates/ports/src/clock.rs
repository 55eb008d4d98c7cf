//! Wall-clock boundary contract.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Relative query windows and system alert timestamps are resolved against
/// this clock so tests can pin time.
pub trait ClockPort: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
