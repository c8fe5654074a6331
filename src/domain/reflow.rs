use crate::domain::window::{DayWindow, Interval};
use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;

/// Packs `items` into `window` in order of their original start: each item
/// starts at its original time or right after the previous one, whichever is
/// later, and is truncated at the window end. Items pushed to or past the end
/// come back with zero duration.
///
/// The returned vector is aligned with `items` (output `i` is the reflowed
/// position of input `i`). Items sharing a start keep their input order,
/// except that zero-length items go ahead of non-empty ones.
pub fn reflow(window: &DayWindow, items: &[Interval]) -> Vec<Interval> {
    let mut order = (0..items.len()).collect::<Vec<_>>();
    order.sort_by_key(|index| (items[*index].start, !items[*index].is_empty()));

    let mut reflowed = items.to_vec();
    let mut cursor = window.start;
    for index in order {
        let item = &items[index];
        let start = item.start.max(cursor).min(window.end());
        let room = window.end() - start;
        let placed = Interval::new(start, item.duration.min(room));
        cursor = placed.end();
        reflowed[index] = placed;
    }
    reflowed
}

/// Re-anchors each item's wall-clock start into `window` before reflowing,
/// used when the day's start time moves.
pub fn reflow_time_of_day(
    window: &DayWindow,
    items: &[(NaiveTime, Duration)],
    tz: Tz,
) -> Vec<Interval> {
    let anchored = items
        .iter()
        .map(|(time_of_day, duration)| Interval::new(window.project(*time_of_day, tz), *duration))
        .collect::<Vec<_>>();
    reflow(window, &anchored)
}

pub fn dropped_count(reflowed: &[Interval]) -> usize {
    reflowed.iter().filter(|interval| interval.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn span(start: &str, end: &str) -> Interval {
        Interval::between(fixed_time(start), fixed_time(end))
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn new_year_window() -> DayWindow {
        DayWindow::new(fixed_time("2025-01-01T00:00:00Z"))
    }

    #[test]
    fn overlapping_items_are_pushed_back_in_order() {
        let window = new_year_window();
        let items = vec![
            span("2025-01-01T09:30:00Z", "2025-01-01T10:00:00Z"),
            span("2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z"),
        ];
        let reflowed = reflow(&window, &items);
        assert_eq!(reflowed[1], span("2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z"));
        assert_eq!(reflowed[0], span("2025-01-01T10:00:00Z", "2025-01-01T10:30:00Z"));
    }

    #[test]
    fn shared_start_keeps_input_order() {
        let window = new_year_window();
        let items = vec![
            span("2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z"),
            span("2025-01-01T09:00:00Z", "2025-01-01T09:30:00Z"),
        ];
        let reflowed = reflow(&window, &items);
        assert_eq!(reflowed[0], span("2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z"));
        assert_eq!(reflowed[1], span("2025-01-01T10:00:00Z", "2025-01-01T10:30:00Z"));
    }

    #[test]
    fn empty_item_sharing_a_start_does_not_push_its_neighbour() {
        let window = new_year_window();
        let items = vec![
            span("2025-01-01T10:00:00Z", "2025-01-01T10:30:00Z"),
            span("2025-01-01T10:00:00Z", "2025-01-01T10:00:00Z"),
        ];
        let reflowed = reflow(&window, &items);
        assert_eq!(reflowed[0], items[0]);
        assert_eq!(reflowed[1], items[1]);
        assert_eq!(reflow(&window, &reflowed), reflowed);
    }

    #[test]
    fn items_before_window_start_move_to_cursor() {
        let window = new_year_window();
        let items = vec![span("2024-12-31T23:00:00Z", "2024-12-31T23:30:00Z")];
        let reflowed = reflow(&window, &items);
        assert_eq!(reflowed[0], span("2025-01-01T00:00:00Z", "2025-01-01T00:30:00Z"));
    }

    #[test]
    fn items_running_past_window_end_are_truncated_or_dropped() {
        let window = new_year_window();
        let items = vec![
            span("2025-01-01T22:00:00Z", "2025-01-01T23:30:00Z"),
            span("2025-01-01T23:00:00Z", "2025-01-02T01:00:00Z"),
            span("2025-01-01T23:45:00Z", "2025-01-02T00:15:00Z"),
        ];
        let reflowed = reflow(&window, &items);
        assert_eq!(reflowed[0], span("2025-01-01T22:00:00Z", "2025-01-01T23:30:00Z"));
        assert_eq!(reflowed[1], span("2025-01-01T23:30:00Z", "2025-01-02T00:00:00Z"));
        assert!(reflowed[2].is_empty());
        assert_eq!(reflowed[2].start, window.end());
        assert_eq!(dropped_count(&reflowed), 1);
    }

    #[test]
    fn late_day_start_reanchors_blocks_into_new_window() {
        let window = DayWindow::new(fixed_time("2025-01-01T06:00:00Z"));
        let items = vec![
            (hm(7, 0), Duration::minutes(30)),
            (hm(5, 30), Duration::minutes(60)),
            (hm(7, 15), Duration::minutes(30)),
        ];
        let reflowed = reflow_time_of_day(&window, &items, Tz::UTC);
        assert_eq!(reflowed[0], span("2025-01-01T07:00:00Z", "2025-01-01T07:30:00Z"));
        assert_eq!(reflowed[2], span("2025-01-01T07:30:00Z", "2025-01-01T08:00:00Z"));
        // 05:30 now belongs to the tail of the rolling day.
        assert_eq!(reflowed[1], span("2025-01-02T05:30:00Z", "2025-01-02T06:00:00Z"));
    }

    fn arb_items() -> impl Strategy<Value = Vec<(i64, i64)>> {
        prop::collection::vec((-180i64..1_600i64, 0i64..400i64), 0..15)
    }

    // Feature: dayplan, Property 6: reflowing an already reflowed day is a no-op
    proptest! {
        #[test]
        fn property6_reflow_idempotence(raw in arb_items()) {
            let window = new_year_window();
            let items = raw
                .iter()
                .map(|(offset, length)| {
                    Interval::new(
                        window.start + Duration::minutes(*offset),
                        Duration::minutes(*length),
                    )
                })
                .collect::<Vec<_>>();

            let once = reflow(&window, &items);
            let twice = reflow(&window, &once);
            prop_assert_eq!(&once, &twice);

            for interval in &once {
                prop_assert!(window.contains(interval));
            }
            for (index, left) in once.iter().enumerate() {
                for right in once.iter().skip(index + 1) {
                    prop_assert!(!left.overlaps(right));
                }
            }
        }
    }
}
