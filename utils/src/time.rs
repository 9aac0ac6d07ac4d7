//! Human-readable durations for user-facing text.

/// Format a duration in seconds as words, e.g. `5 minutes`, `1 hour 30 minutes`.
///
/// Only the two most significant units are shown.
pub fn format_duration(secs: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

    if secs == 0 {
        return "0 seconds".to_string();
    }

    let mut parts = Vec::new();
    let mut rest = secs;
    for (size, name) in UNITS {
        if rest >= size {
            let n = rest / size;
            rest %= size;
            parts.push(format!("{n} {name}{}", if n == 1 { "" } else { "s" }));
        } else if !parts.is_empty() {
            // Skip zero-valued units between the two shown.
            break;
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}
