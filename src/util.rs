//! Display helpers for server timestamps.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const PLACEHOLDER: &str = "-";

/// Parse a server timestamp. Offsets are honored; naive timestamps are
/// taken as local time.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

fn format_with(value: Option<&str>, pattern: &str) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => PLACEHOLDER.to_string(),
        Some(v) => match parse_timestamp(v) {
            Some(dt) => dt.format(pattern).to_string(),
            None => v.to_string(),
        },
    }
}

/// `YYYY-MM-DD HH:mm:ss`, or `-` when absent. Unparseable input is
/// returned unchanged.
pub fn format_date_time(value: Option<&str>) -> String {
    format_with(value, "%Y-%m-%d %H:%M:%S")
}

/// `YYYY-MM-DD`, or `-` when absent.
pub fn format_date(value: Option<&str>) -> String {
    format_with(value, "%Y-%m-%d")
}

/// Human distance between `at` and `now`, e.g. "in 5 minutes" or
/// "3 hours ago".
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (at - now).num_seconds();
    let past = seconds < 0;
    let magnitude = seconds.unsigned_abs();
    if magnitude < 45 {
        return "just now".to_string();
    }
    let (count, unit) = match magnitude {
        s if s < 3_600 => ((s + 30) / 60, "minute"),
        s if s < 86_400 => ((s + 1_800) / 3_600, "hour"),
        s if s < 30 * 86_400 => ((s + 43_200) / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let count = count.max(1);
    let plural = if count == 1 { "" } else { "s" };
    if past {
        format!("{count} {unit}{plural} ago")
    } else {
        format!("in {count} {unit}{plural}")
    }
}
