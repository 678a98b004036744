//! Formatting helpers for byte counts and times.

use std::time::SystemTime;

/// Format a byte count in human-readable binary units (1 KiB = 1024 bytes).
///
/// `format_bytes(1024)` is `"1.00 KiB"`, `format_bytes(512)` is `"512 B"`.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

    let bytes_f = bytes as f64;

    if bytes_f >= TIB {
        format!("{:.2} TiB", bytes_f / TIB)
    } else if bytes_f >= GIB {
        format!("{:.2} GiB", bytes_f / GIB)
    } else if bytes_f >= MIB {
        format!("{:.2} MiB", bytes_f / MIB)
    } else if bytes_f >= KIB {
        format!("{:.2} KiB", bytes_f / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format time elapsed since a given time point, e.g.
/// `"1 minute, 12 seconds ago"`.
pub fn format_time_ago(time: SystemTime) -> String {
    let duration = match SystemTime::now().duration_since(time) {
        Ok(d) => d,
        Err(_) => return "in the future".to_string(),
    };

    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{} second{} ago", secs, plural(secs));
    }

    let (big, big_unit, small, small_unit) = if secs < 3600 {
        (secs / 60, "minute", secs % 60, "second")
    } else if secs < 86400 {
        (secs / 3600, "hour", (secs % 3600) / 60, "minute")
    } else {
        (secs / 86400, "day", (secs % 86400) / 3600, "hour")
    };

    if small == 0 {
        format!("{} {}{} ago", big, big_unit, plural(big))
    } else {
        format!(
            "{} {}{}, {} {}{} ago",
            big,
            big_unit,
            plural(big),
            small,
            small_unit,
            plural(small)
        )
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
