use chrono::Duration;

/// Formats a span of seconds as `"2h 5m 30s"`.
///
/// Zero hours and zero minutes are left out, seconds are always shown, and
/// negative input counts as zero.
pub fn format_duration(seconds: i64) -> String {
    let total = seconds.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format_duration(elapsed.num_seconds())
}

/// Elapsed time between two instants, never negative.
pub fn clamped_elapsed<Tz: chrono::TimeZone>(
    start: &chrono::DateTime<Tz>,
    end: &chrono::DateTime<Tz>,
) -> Duration {
    let elapsed = end.clone() - start.clone();
    if elapsed < Duration::zero() {
        Duration::zero()
    } else {
        elapsed
    }
}
