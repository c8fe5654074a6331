use crate::domain::window::Interval;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    PreferBefore,
    #[default]
    PreferAfter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementRequest {
    pub desired_time: NaiveTime,
    pub duration_minutes: u32,
    pub bias: Bias,
}

impl PlacementRequest {
    pub fn new(desired_time: NaiveTime, duration_minutes: u32, bias: Bias) -> Self {
        Self {
            desired_time,
            duration_minutes,
            bias,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// How far the placer may go when no gap fits the full request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementPolicy {
    pub allow_shrink: bool,
    pub minimum_shrunk_minutes: u32,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            allow_shrink: true,
            minimum_shrunk_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementResult {
    Placed(Interval),
    NoRoom,
}

impl PlacementResult {
    pub fn interval(&self) -> Option<Interval> {
        match self {
            PlacementResult::Placed(interval) => Some(*interval),
            PlacementResult::NoRoom => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, PlacementResult::Placed(_))
    }
}

pub fn place(
    gaps: &[Interval],
    request: &PlacementRequest,
    desired_start: DateTime<Utc>,
) -> PlacementResult {
    place_with_policy(gaps, request, desired_start, &PlacementPolicy::default())
}

/// Places a block near `desired_start`: unchanged if it already fits, else in
/// the nearest long-enough gap on the biased side (then the other side), else
/// shrunk to the nearest non-empty gap.
pub fn place_with_policy(
    gaps: &[Interval],
    request: &PlacementRequest,
    desired_start: DateTime<Utc>,
    policy: &PlacementPolicy,
) -> PlacementResult {
    let requested = request.duration();
    let wanted = Interval::new(desired_start, requested);
    if gaps.iter().any(|gap| gap.contains(&wanted)) {
        return PlacementResult::Placed(wanted);
    }

    let candidates = candidates_by_preference(gaps, desired_start, request.bias);

    if let Some(gap) = candidates.iter().find(|gap| gap.duration >= requested) {
        return PlacementResult::Placed(full_length_slot(gap, desired_start, requested));
    }

    if !policy.allow_shrink {
        return PlacementResult::NoRoom;
    }
    let minimum = Duration::minutes(i64::from(policy.minimum_shrunk_minutes));
    candidates
        .iter()
        .find(|gap| !gap.is_empty() && gap.duration >= minimum)
        .map(|gap| PlacementResult::Placed(**gap))
        .unwrap_or(PlacementResult::NoRoom)
}

/// Gaps ordered nearest-first: gaps starting before the desired time walk
/// backward, gaps starting at or after it walk forward. A gap straddling the
/// desired time counts as before. Equal starts keep gap order.
fn candidates_by_preference(
    gaps: &[Interval],
    desired_start: DateTime<Utc>,
    bias: Bias,
) -> Vec<&Interval> {
    let mut sorted = gaps.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|gap| gap.start);
    let (before, after): (Vec<&Interval>, Vec<&Interval>) = sorted
        .into_iter()
        .partition(|gap| gap.start < desired_start);

    let mut ordered = Vec::with_capacity(gaps.len());
    match bias {
        Bias::PreferBefore => {
            ordered.extend(before.iter().rev().copied());
            ordered.extend(after.iter().copied());
        }
        Bias::PreferAfter => {
            ordered.extend(after.iter().copied());
            ordered.extend(before.iter().rev().copied());
        }
    }
    ordered
}

fn full_length_slot(gap: &Interval, desired_start: DateTime<Utc>, requested: Duration) -> Interval {
    if gap.start < desired_start {
        let latest_start = gap.end() - requested;
        Interval::new(desired_start.min(latest_start), requested)
    } else {
        Interval::new(gap.start, requested)
    }
}
