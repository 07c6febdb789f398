//! Household civil time.
//!
//! All local-time decisions go through an IANA zone so daylight-saving
//! transitions are applied, never a fixed UTC offset.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{HearthError, HearthResult};

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> HearthResult<Tz> {
    name.parse::<Tz>()
        .map_err(|e| HearthError::Configuration(format!("invalid timezone '{}': {}", name, e)))
}

/// Convert a UTC instant to household local time.
pub fn to_local(at: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    at.with_timezone(&tz)
}

/// Local day-of-week (Monday = 0) and hour-of-day.
pub fn local_day_and_hour(at: DateTime<Utc>, tz: Tz) -> (usize, usize) {
    let local = to_local(at, tz);
    (
        local.weekday().num_days_from_monday() as usize,
        local.hour() as usize,
    )
}

/// Local calendar day as `YYYY-MM-DD`.
pub fn local_day_key(at: DateTime<Utc>, tz: Tz) -> String {
    to_local(at, tz).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daylight_saving_applied() {
        let tz = parse_timezone("Europe/London").unwrap();
        // Winter: GMT.
        let winter = Utc.with_ymd_and_hms(2026, 1, 14, 18, 30, 0).unwrap();
        assert_eq!(local_day_and_hour(winter, tz), (2, 18));
        // Summer: BST, one hour ahead.
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 18, 30, 0).unwrap();
        assert_eq!(local_day_and_hour(summer, tz), (2, 19));
    }

    #[test]
    fn test_day_rolls_over_in_local_time() {
        let tz = parse_timezone("America/New_York").unwrap();
        // 02:00 UTC Tuesday is still Monday evening in New York.
        let at = Utc.with_ymd_and_hms(2026, 3, 17, 2, 0, 0).unwrap();
        assert_eq!(local_day_and_hour(at, tz), (0, 22));
        assert_eq!(local_day_key(at, tz), "2026-03-16");
    }

    #[test]
    fn test_invalid_timezone() {
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(HearthError::Configuration(_))
        ));
    }
}
