use chrono::{DateTime, Utc};

/// Seconds per bucket, largest first.
const YEAR: i64 = 31_536_000;
const MONTH: i64 = 2_592_000;
const DAY: i64 = 86_400;
const HOUR: i64 = 3_600;
const MINUTE: i64 = 60;

/// Formats a comment timestamp (epoch milliseconds) as a coarse relative
/// age, e.g. "3 hours ago".
///
/// Ages are floored to the largest bucket strictly exceeded: 90 seconds
/// is "1 minutes ago", 59 seconds is "59 seconds ago". Timestamps in the
/// future (clock skew between writers) clamp to "0 seconds ago".
pub fn time_ago(created_at_ms: i64, now: DateTime<Utc>) -> String {
    let seconds = (now.timestamp_millis() - created_at_ms).max(0) / 1000;

    for (unit, label) in [
        (YEAR, "years"),
        (MONTH, "months"),
        (DAY, "days"),
        (HOUR, "hours"),
        (MINUTE, "minutes"),
    ] {
        if seconds > unit {
            return format!("{} {} ago", seconds / unit, label);
        }
    }
    format!("{} seconds ago", seconds)
}
