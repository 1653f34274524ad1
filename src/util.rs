use std::env;

use chrono::NaiveDateTime;

/// Accepted formats for free-form date/time tool arguments, tried in order.
/// A trailing `Z` is stripped before matching.
const EVENT_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

pub(crate) const EVENT_TIME_EXAMPLE: &str = "2025-08-14T14:00:00";

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn env_required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    env_optional(name).ok_or_else(|| format!("Missing {name}").into())
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    env_optional(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.trim().trim_end_matches('Z');
    EVENT_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cleaned, fmt).ok())
}

/// Parse a Graph timestamp for display. Graph returns RFC 3339 with `Z` for
/// message fields and zone-less values with fractional seconds for event
/// start/end, so both shapes are handled.
pub(crate) fn parse_graph_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub(crate) fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_time_seconds_precision() {
        let dt = parse_event_time("2025-08-14T14:00:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-08-14 14:00:00");
    }

    #[test]
    fn parse_event_time_space_separated() {
        assert!(parse_event_time("2025-08-14 14:00:00").is_some());
    }

    #[test]
    fn parse_event_time_minute_precision() {
        assert!(parse_event_time("2025-08-14T14:00").is_some());
    }

    #[test]
    fn parse_event_time_strips_trailing_z() {
        assert_eq!(
            parse_event_time("2025-08-14T14:00:00Z"),
            parse_event_time("2025-08-14T14:00:00")
        );
    }

    #[test]
    fn parse_event_time_rejects_garbage() {
        assert!(parse_event_time("tomorrow at noon").is_none());
        assert!(parse_event_time("").is_none());
    }

    #[test]
    fn parse_graph_datetime_rfc3339() {
        let dt = parse_graph_datetime("2025-08-14T09:30:00Z").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-08-14 09:30");
    }

    #[test]
    fn parse_graph_datetime_fractional_no_zone() {
        let dt = parse_graph_datetime("2025-08-14T09:00:00.0000000").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn truncate_preview_short_text_unchanged() {
        assert_eq!(truncate_preview("hello", 150), "hello");
    }

    #[test]
    fn truncate_preview_adds_ellipsis() {
        let long = "x".repeat(200);
        let out = truncate_preview(&long, 150);
        assert_eq!(out.chars().count(), 153);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn env_u64_default_on_missing() {
        assert_eq!(env_u64("OUTLOOK_CONNECTOR_NO_SUCH_VAR", 42), 42);
    }
}
