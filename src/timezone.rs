use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// The current UTC offset of `canonical_timezone`, e.g. "Africa/Douala".
///
/// Returns `None` if the name is not a known timezone.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

#[cfg(test)]
mod tests {
    use time::UtcOffset;

    use super::get_local_offset;

    #[test]
    fn douala_is_one_hour_ahead() {
        assert_eq!(
            get_local_offset("Africa/Douala"),
            UtcOffset::from_hms(1, 0, 0).ok()
        );
    }

    #[test]
    fn unknown_timezone() {
        assert_eq!(get_local_offset("Middle/Earth"), None);
    }
}
