//! Human readable labels for gallery entries

use std::time::Duration;

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Format seconds as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_elapsed_time(secs: u64) -> String {
    let hours = secs / SECS_PER_HOUR;
    let minutes = (secs % SECS_PER_HOUR) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Format how long ago something happened.
///
/// Past a day this is a day count, past an hour `HHh MMm`, otherwise the
/// [`format_elapsed_time`] clock form.
pub fn format_age(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let secs = elapsed.as_secs();

    if millis > u128::from(SECS_PER_DAY) * 1000 {
        let days = secs / SECS_PER_DAY;
        let unit = if days == 1 { "day" } else { "days" };
        format!("{days} {unit}")
    } else if millis > u128::from(SECS_PER_HOUR) * 1000 {
        let hours = secs / SECS_PER_HOUR;
        let minutes = (secs - hours * SECS_PER_HOUR) / 60;
        format!("{hours:02}h {minutes:02}m")
    } else {
        format_elapsed_time(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(format_elapsed_time(0), "00:00");
        assert_eq!(format_elapsed_time(75), "01:15");
        assert_eq!(format_elapsed_time(3599), "59:59");
        assert_eq!(format_elapsed_time(3600), "1:00:00");
        assert_eq!(format_elapsed_time(36_061), "10:01:01");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::from_secs(42)), "00:42");
        assert_eq!(format_age(Duration::from_secs(2 * 3600 + 5 * 60)), "02h 05m");
        assert_eq!(format_age(Duration::from_secs(SECS_PER_DAY + 10)), "1 day");
        assert_eq!(format_age(Duration::from_secs(3 * SECS_PER_DAY + 10)), "3 days");
    }

    #[test]
    fn test_format_age_counts_sub_second_remainder() {
        let just_past_day = Duration::from_secs(SECS_PER_DAY) + Duration::from_millis(500);
        assert_eq!(format_age(just_past_day), "1 day");

        let just_past_hour = Duration::from_secs(SECS_PER_HOUR) + Duration::from_millis(500);
        assert_eq!(format_age(just_past_hour), "01h 00m");

        assert_eq!(format_age(Duration::from_secs(SECS_PER_DAY)), "24h 00m");
        assert_eq!(format_age(Duration::from_secs(SECS_PER_HOUR)), "1:00:00");
    }
}
