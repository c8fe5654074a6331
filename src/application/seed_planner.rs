use crate::domain::gaps::find_gaps;
use crate::domain::placement::{
    place_with_policy, PlacementPolicy, PlacementRequest, PlacementResult,
};
use crate::domain::window::{DayWindow, Interval};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    Anchor,
    Rhythm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedStep {
    pub key: String,
    pub request: PlacementRequest,
    pub kind: SeedKind,
}

/// Fixed-time anchors first, elastic rhythm blocks last; order within each
/// kind is preserved.
pub fn order_steps(mut steps: Vec<SeedStep>) -> Vec<SeedStep> {
    steps.sort_by_key(|step| match step.kind {
        SeedKind::Anchor => 0,
        SeedKind::Rhythm => 1,
    });
    steps
}

/// Places requests one after another so earlier placements shape the gaps
/// left for later ones.
#[derive(Debug, Clone)]
pub struct SeedPlanner {
    window: DayWindow,
    tz: Tz,
    policy: PlacementPolicy,
    occupied: Vec<Interval>,
}

impl SeedPlanner {
    pub fn new(window: DayWindow, tz: Tz) -> Self {
        Self {
            window,
            tz,
            policy: PlacementPolicy::default(),
            occupied: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: PlacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_occupied(mut self, occupied: Vec<Interval>) -> Self {
        self.occupied = occupied;
        self
    }

    pub fn window(&self) -> &DayWindow {
        &self.window
    }

    pub fn occupied(&self) -> &[Interval] {
        &self.occupied
    }

    pub fn into_occupied(self) -> Vec<Interval> {
        self.occupied
    }

    pub fn gaps(&self) -> Vec<Interval> {
        find_gaps(&self.window, &self.occupied)
    }

    pub fn place(&mut self, request: &PlacementRequest) -> PlacementResult {
        let gaps = self.gaps();
        let desired_start = self.window.project(request.desired_time, self.tz);
        let result = place_with_policy(&gaps, request, desired_start, &self.policy);
        if let PlacementResult::Placed(interval) = result {
            if !interval.is_empty() {
                self.occupied.push(interval);
            }
        }
        result
    }

    pub fn seed(&mut self, requests: &[PlacementRequest]) -> Vec<PlacementResult> {
        requests.iter().map(|request| self.place(request)).collect()
    }

    pub fn seed_steps(&mut self, steps: &[SeedStep]) -> Vec<PlacementResult> {
        steps.iter().map(|step| self.place(&step.request)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::placement::Bias;
    use chrono::{DateTime, NaiveTime, Utc};
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

    fn planner() -> SeedPlanner {
        SeedPlanner::new(DayWindow::new(fixed_time("2025-01-01T06:00:00Z")), Tz::UTC)
    }

    fn anchor_step(hour: u32, minutes: u32) -> SeedStep {
        SeedStep {
            key: format!("anchor-{hour}"),
            request: PlacementRequest::new(hm(hour, 0), minutes, Bias::PreferAfter),
            kind: SeedKind::Anchor,
        }
    }

    fn rhythm_step(hour: u32, minutes: u32, bias: Bias) -> SeedStep {
        SeedStep {
            key: format!("rhythm-{hour}"),
            request: PlacementRequest::new(hm(hour, 0), minutes, bias),
            kind: SeedKind::Rhythm,
        }
    }

    #[test]
    fn order_steps_moves_anchors_first_and_keeps_relative_order() {
        let steps = vec![
            rhythm_step(6, 30, Bias::PreferBefore),
            anchor_step(9, 480),
            rhythm_step(21, 60, Bias::PreferAfter),
            anchor_step(12, 45),
        ];
        let ordered = order_steps(steps);
        assert_eq!(ordered[0].key, "anchor-9");
        assert_eq!(ordered[0].request.desired_time, hm(9, 0));
        assert_eq!(ordered[1].request.desired_time, hm(12, 0));
        assert_eq!(ordered[2].request.desired_time, hm(6, 0));
        assert_eq!(ordered[3].request.desired_time, hm(21, 0));
    }

    #[test]
    fn rhythm_blocks_slide_around_fixed_anchors() {
        let mut planner = planner();
        let steps = order_steps(vec![
            rhythm_step(8, 60, Bias::PreferBefore),
            anchor_step(8, 540),
            rhythm_step(17, 90, Bias::PreferAfter),
        ]);
        let results = planner.seed_steps(&steps);

        assert_eq!(
            results[0],
            PlacementResult::Placed(span("2025-01-01T08:00:00Z", "2025-01-01T17:00:00Z"))
        );
        assert_eq!(
            results[1],
            PlacementResult::Placed(span("2025-01-01T07:00:00Z", "2025-01-01T08:00:00Z"))
        );
        assert_eq!(
            results[2],
            PlacementResult::Placed(span("2025-01-01T17:00:00Z", "2025-01-01T18:30:00Z"))
        );
        assert_eq!(planner.occupied().len(), 3);
    }

    #[test]
    fn existing_blocks_are_respected() {
        let mut planner =
            planner().with_occupied(vec![span("2025-01-01T06:00:00Z", "2025-01-02T05:30:00Z")]);
        let results = planner.seed(&[
            PlacementRequest::new(hm(12, 0), 60, Bias::PreferAfter),
            PlacementRequest::new(hm(12, 0), 60, Bias::PreferAfter),
        ]);
        assert_eq!(
            results[0],
            PlacementResult::Placed(span("2025-01-02T05:30:00Z", "2025-01-02T06:00:00Z"))
        );
        assert_eq!(results[1], PlacementResult::NoRoom);
        assert!(planner.gaps().is_empty());
    }

    #[test]
    fn strict_policy_skips_tiny_leftovers() {
        let mut planner = planner()
            .with_occupied(vec![span("2025-01-01T06:00:00Z", "2025-01-02T05:58:00Z")])
            .with_policy(PlacementPolicy {
                allow_shrink: true,
                minimum_shrunk_minutes: 5,
            });
        let result = planner.place(&PlacementRequest::new(hm(10, 0), 30, Bias::PreferAfter));
        assert_eq!(result, PlacementResult::NoRoom);
        assert_eq!(planner.into_occupied().len(), 1);
    }

    fn arb_step() -> impl Strategy<Value = SeedStep> {
        (
            0u32..24u32,
            1u32..600u32,
            prop_oneof![Just(Bias::PreferBefore), Just(Bias::PreferAfter)],
            prop_oneof![Just(SeedKind::Anchor), Just(SeedKind::Rhythm)],
        )
            .prop_map(|(hour, minutes, bias, kind)| SeedStep {
                key: format!("step-{hour}"),
                request: PlacementRequest::new(hm(hour, 0), minutes, bias),
                kind,
            })
    }

    // Feature: dayplan, Property 7: seeding keeps the day free of overlaps
    proptest! {
        #[test]
        fn property7_seeded_day_has_no_overlaps(steps in prop::collection::vec(arb_step(), 1..20)) {
            let mut planner = planner();
            let steps = order_steps(steps);
            let _ = planner.seed_steps(&steps);
            let window = *planner.window();
            let occupied = planner.into_occupied();
            for interval in &occupied {
                prop_assert!(window.contains(interval));
            }
            for (index, left) in occupied.iter().enumerate() {
                for right in occupied.iter().skip(index + 1) {
                    prop_assert!(!left.overlaps(right));
                }
            }
        }
    }
}
