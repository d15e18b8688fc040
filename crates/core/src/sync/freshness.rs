use chrono::{DateTime, TimeDelta, Utc};

/// "just now", "42s ago", "3 min ago", "2 h ago".
pub fn relative_label(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - updated_at).max(TimeDelta::zero());

    match elapsed.num_seconds() {
        s if s < 5 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{} min ago", s / 60),
        s => format!("{} h ago", s / 3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_label_buckets() {
        let t0 = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let label = |secs: i64| relative_label(t0, t0 + TimeDelta::seconds(secs));

        assert_eq!(label(0), "just now");
        assert_eq!(label(4), "just now");
        assert_eq!(label(5), "5s ago");
        assert_eq!(label(59), "59s ago");
        assert_eq!(label(60), "1 min ago");
        assert_eq!(label(3599), "59 min ago");
        assert_eq!(label(7300), "2 h ago");
    }

    #[test]
    fn test_clock_skew_reads_as_fresh() {
        let now = Utc::now();
        assert_eq!(relative_label(now + TimeDelta::seconds(30), now), "just now");
    }
}
