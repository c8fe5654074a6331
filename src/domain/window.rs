use crate::domain::time_anchor::anchor_time_of_day;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DAY_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub duration: Duration,
}

impl Interval {
    /// Negative durations are floored at zero.
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            duration: duration.max(Duration::zero()),
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(start, end - start)
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.duration <= Duration::zero()
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end() <= self.end()
    }

    /// Zero-length intervals never overlap anything.
    pub fn overlaps(&self, other: &Interval) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end()
            && other.start < self.end()
    }
}

/// Rolling 24-hour scheduling window `[start, start + 24h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
}

impl DayWindow {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }

    /// Window starting at `day_start` local time on `date` in `tz`.
    pub fn anchored(date: NaiveDate, day_start: NaiveTime, tz: Tz) -> Self {
        let start = tz
            .from_local_datetime(&date.and_time(day_start))
            .earliest()
            .or_else(|| tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        Self { start }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::hours(DAY_WINDOW_HOURS)
    }

    pub fn interval(&self) -> Interval {
        Interval::between(self.start, self.end())
    }

    pub fn contains(&self, interval: &Interval) -> bool {
        self.start <= interval.start && interval.end() <= self.end()
    }

    /// Portion of `interval` inside the window, `None` when nothing remains.
    pub fn clip(&self, interval: &Interval) -> Option<Interval> {
        let start = interval.start.max(self.start);
        let end = interval.end().min(self.end());
        (end > start).then(|| Interval::between(start, end))
    }

    pub fn minutes_until_end(&self, from: DateTime<Utc>) -> i64 {
        (self.end() - from).num_minutes().max(0)
    }

    /// Projects a wall-clock time onto the window, rolling over to the next
    /// local date when the time falls before the window start.
    pub fn project(&self, time_of_day: NaiveTime, tz: Tz) -> DateTime<Utc> {
        let mut projected = anchor_time_of_day(time_of_day, self.start, tz);
        if projected < self.start {
            projected = anchor_time_of_day(time_of_day, self.end(), tz);
        }
        projected.clamp(self.start, self.end())
    }
}

/// Caps `requested_minutes` so a block starting at `start` never runs past the
/// window end. Negative requests clamp to zero.
pub fn clamp_duration(start: DateTime<Utc>, requested_minutes: i64, window: &DayWindow) -> i64 {
    if start >= window.end() {
        return 0;
    }
    requested_minutes
        .max(0)
        .min(window.minutes_until_end(start))
}
