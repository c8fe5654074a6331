use crate::domain::window::{DayWindow, Interval};

/// Free sub-intervals of `window` not covered by `occupied`, sorted by start.
/// Occupied intervals may overlap or extend past the window.
pub fn find_gaps(window: &DayWindow, occupied: &[Interval]) -> Vec<Interval> {
    let mut busy = occupied
        .iter()
        .filter_map(|interval| window.clip(interval))
        .collect::<Vec<_>>();
    busy.sort_by(|left, right| left.start.cmp(&right.start).then(left.end().cmp(&right.end())));

    let mut gaps = Vec::new();
    let mut cursor = window.start;
    for interval in &busy {
        if interval.start > cursor {
            gaps.push(Interval::between(cursor, interval.start));
        }
        if interval.end() > cursor {
            cursor = interval.end();
        }
    }
    if cursor < window.end() {
        gaps.push(Interval::between(cursor, window.end()));
    }
    gaps
}

pub fn free_minutes(gaps: &[Interval]) -> i64 {
    gaps.iter().map(|gap| gap.duration.num_minutes()).sum()
}
