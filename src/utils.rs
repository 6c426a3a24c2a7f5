use chrono::{DateTime, Duration, Local, TimeZone, Utc};

/// Milliseconds since the epoch for `now` shifted by `offset_secs`, or `None`
/// when the shift leaves chrono's representable range.
pub fn offset_timestamp_ms(now: DateTime<Utc>, offset_secs: i64) -> Option<i64> {
    let offset = Duration::try_seconds(offset_secs)?;
    now.checked_add_signed(offset).map(|at| at.timestamp_millis())
}

pub fn now_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `YYYY-MM-DD_HHMMSS.mp4` in the given time zone.
pub fn recording_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.mp4", at.format("%Y-%m-%d_%H%M%S"))
}

pub fn local_recording_filename() -> String {
    recording_filename(&Local::now())
}

/// Parses an optional integer query value, treating junk as absent.
pub fn parse_int_param(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_timestamp_ms() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(offset_timestamp_ms(now, 0), Some(1_709_294_400_000));
        assert_eq!(offset_timestamp_ms(now, 30), Some(1_709_294_430_000));
        assert_eq!(offset_timestamp_ms(now, -60), Some(1_709_294_340_000));
    }

    #[test]
    fn test_offset_timestamp_out_of_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(offset_timestamp_ms(now, 100_000_000_000_000), None);
        assert_eq!(offset_timestamp_ms(now, i64::MIN), None);
        assert_eq!(offset_timestamp_ms(now, i64::MAX), None);
    }

    #[test]
    fn test_recording_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
        assert_eq!(recording_filename(&at), "2024-03-01_070509.mp4");
    }

    #[test]
    fn test_parse_int_param() {
        assert_eq!(parse_int_param(Some(&"5".to_string())), Some(5));
        assert_eq!(parse_int_param(Some(&"-3".to_string())), Some(-3));
        assert_eq!(parse_int_param(Some(&"abc".to_string())), None);
        assert_eq!(parse_int_param(Some(&"".to_string())), None);
        assert_eq!(parse_int_param(None), None);
    }
}
