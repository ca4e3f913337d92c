use time::{Duration, OffsetDateTime};

/// Seconds between 1904-01-01T00:00:00Z and the Unix epoch.
pub const SAMI_EPOCH_OFFSET_SECONDS: i64 = 2_082_844_800;

/// Converts instrument seconds (1904 epoch) to a UTC timestamp.
///
/// ```
/// use sami::sami_seconds_to_utc;
///
/// assert_eq!(1904, sami_seconds_to_utc(0).year());
/// assert_eq!(0, sami_seconds_to_utc(2_082_844_800).unix_timestamp());
/// ```
#[must_use]
pub fn sami_seconds_to_utc(seconds: u32) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::seconds(i64::from(seconds) - SAMI_EPOCH_OFFSET_SECONDS)
}

/// Converts a UTC timestamp to instrument seconds, when representable.
#[must_use]
pub fn sami_seconds_from_utc(at: OffsetDateTime) -> Option<u32> {
    u32::try_from(at.unix_timestamp() + SAMI_EPOCH_OFFSET_SECONDS).ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn conversions_are_inverse() {
        let at = datetime!(2014-05-01 12:00:00 UTC);
        let seconds = sami_seconds_from_utc(at).expect("2014 fits in u32");
        assert_eq!(at, sami_seconds_to_utc(seconds));
    }

    #[test]
    fn times_before_1904_are_unrepresentable() {
        assert_eq!(None, sami_seconds_from_utc(datetime!(1903-12-31 23:59:59 UTC)));
    }
}
