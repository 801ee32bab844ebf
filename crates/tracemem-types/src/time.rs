use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp as ISO-8601 UTC with microsecond precision.
///
/// The fixed-width `Z`-suffixed form sorts lexicographically in timestamp
/// order, which the storage backends rely on for `ORDER BY created_at`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored ISO-8601 timestamp back into a `DateTime<Utc>`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let ts = now();
        let raw = format_timestamp(ts);
        let parsed = parse_timestamp(&raw).unwrap();
        // Formatting truncates below microseconds.
        assert_eq!(format_timestamp(parsed), raw);
    }

    #[test]
    fn test_lexicographic_order_matches_time_order() {
        let a = parse_timestamp("2025-12-10T10:00:00.000001Z").unwrap();
        let b = parse_timestamp("2025-12-10T10:00:00.000002Z").unwrap();
        assert!(a < b);
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("not-a-timestamp").is_none());
    }
}
