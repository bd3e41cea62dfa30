//! Timestamp labels used in transcripts and console output.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Local-time label format, e.g. `[Monday, 05-01-2023, 14:03:59]`.
pub const LABEL_FORMAT: &str = "[%A, %m-%d-%Y, %H:%M:%S]";

/// Render a timestamp as a human-readable local-time label.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(LABEL_FORMAT).to_string()
}

/// Parse a label produced by [`format_timestamp`] back into a UTC instant.
///
/// Sub-second precision is lost by the label, so the result is truncated to
/// whole seconds.
pub fn parse_timestamp_label(label: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(label.trim(), LABEL_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Seconds since the Unix epoch, with fractional part.
pub fn epoch_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn label_roundtrip_keeps_whole_seconds() {
        let now = Utc::now().with_nanosecond(0).unwrap();
        let label = format_timestamp(now);
        assert!(label.starts_with('['));
        assert!(label.ends_with(']'));
        assert_eq!(parse_timestamp_label(&label), Some(now));
    }

    #[test]
    fn garbage_label_is_none() {
        assert!(parse_timestamp_label("yesterday-ish").is_none());
    }

    #[test]
    fn epoch_secs_has_fraction() {
        let ts = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        assert!((epoch_secs(ts) - 1_700_000_000.25).abs() < 1e-6);
    }
}
