use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Re-applies the local wall-clock time of `time` onto the local calendar date
/// of `to`. Falls back to `to` when the resulting local time does not exist.
pub fn anchor(time: DateTime<Utc>, to: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = time.with_timezone(&tz);
    let Some(time_of_day) = NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second())
    else {
        return to;
    };
    anchor_time_of_day(time_of_day, to, tz)
}

pub fn anchor_time_of_day(time_of_day: NaiveTime, to: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let date = to.with_timezone(&tz).date_naive();
    tz.from_local_datetime(&date.and_time(time_of_day))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn anchor_moves_time_of_day_onto_target_date() {
        let time = fixed_time("2024-06-15T07:30:45Z");
        let to = fixed_time("2025-01-01T23:00:00Z");
        assert_eq!(anchor(time, to, Tz::UTC), fixed_time("2025-01-01T07:30:45Z"));
    }

    #[test]
    fn anchor_drops_subsecond_precision() {
        let time = fixed_time("2024-06-15T07:30:45.750Z");
        let to = fixed_time("2025-01-01T00:00:00Z");
        assert_eq!(anchor(time, to, Tz::UTC), fixed_time("2025-01-01T07:30:45Z"));
    }

    #[test]
    fn anchor_uses_local_calendar_of_target() {
        // 2025-01-01T20:00Z is already Jan 2 in Tokyo.
        let time = fixed_time("2024-06-15T00:15:00Z");
        let to = fixed_time("2025-01-01T20:00:00Z");
        let anchored = anchor(time, to, Tz::Asia__Tokyo);
        assert_eq!(anchored, fixed_time("2025-01-02T00:15:00Z"));
    }

    #[test]
    fn anchor_falls_back_to_target_for_nonexistent_local_time() {
        let time_of_day = NaiveTime::from_hms_opt(2, 30, 0).expect("valid time");
        let to = fixed_time("2025-03-09T12:00:00Z");
        assert_eq!(
            anchor_time_of_day(time_of_day, to, Tz::America__New_York),
            to
        );
    }

    #[test]
    fn anchor_prefers_earliest_instant_for_ambiguous_local_time() {
        let time_of_day = NaiveTime::from_hms_opt(1, 30, 0).expect("valid time");
        let to = fixed_time("2025-11-02T12:00:00Z");
        assert_eq!(
            anchor_time_of_day(time_of_day, to, Tz::America__New_York),
            fixed_time("2025-11-02T05:30:00Z")
        );
    }
}
