//! Frontier ranking policies.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::frontier::Frontier;

/// Orders frontiers best-first.
///
/// Implementations must be deterministic: equal candidates are ordered by
/// [`Frontier::tie_key`].
pub trait FrontierRanking: Send + Sync + fmt::Debug {
    fn rank(&self, frontiers: &mut [Frontier]);
}

/// Built-in ranking policies.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrontierPolicy {
    /// Closest region first (distance to its nearest member cell)
    #[default]
    Nearest,
    /// Largest region first
    Largest,
    /// Normalized `size_weight * size - distance_weight * distance`
    Weighted {
        size_weight: f32,
        distance_weight: f32,
    },
}

impl FrontierRanking for FrontierPolicy {
    fn rank(&self, frontiers: &mut [Frontier]) {
        match *self {
            FrontierPolicy::Nearest => {
                for f in frontiers.iter_mut() {
                    f.score = -f.distance;
                }
                frontiers.sort_by(|a, b| by_distance(a, b).then_with(|| by_tie(a, b)));
            }
            FrontierPolicy::Largest => {
                for f in frontiers.iter_mut() {
                    f.score = f.size() as f32;
                }
                frontiers.sort_by(|a, b| {
                    b.size()
                        .cmp(&a.size())
                        .then_with(|| by_distance(a, b))
                        .then_with(|| by_tie(a, b))
                });
            }
            FrontierPolicy::Weighted {
                size_weight,
                distance_weight,
            } => {
                normalize_scores(frontiers, size_weight, distance_weight);
                frontiers.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| by_tie(a, b)));
            }
        }
    }
}

fn by_distance(a: &Frontier, b: &Frontier) -> Ordering {
    a.distance.total_cmp(&b.distance)
}

fn by_tie(a: &Frontier, b: &Frontier) -> Ordering {
    a.tie_key().cmp(&b.tie_key())
}

/// Scale sqrt(size) and distance to [0, 1] across the candidate set before
/// weighting, so the weights are comparable regardless of map scale.
fn normalize_scores(frontiers: &mut [Frontier], size_weight: f32, distance_weight: f32) {
    if frontiers.is_empty() {
        return;
    }

    const EPSILON: f32 = 1e-6;

    let (min_size, max_size) = frontiers
        .iter()
        .map(|f| (f.size() as f32).sqrt())
        .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v), max.max(v)));
    let (min_dist, max_dist) = frontiers
        .iter()
        .map(|f| f.distance)
        .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v), max.max(v)));

    let size_range = (max_size - min_size).max(EPSILON);
    let dist_range = (max_dist - min_dist).max(EPSILON);

    for frontier in frontiers.iter_mut() {
        let norm_size = ((frontier.size() as f32).sqrt() - min_size) / size_range;
        let norm_dist = (frontier.distance - min_dist) / dist_range;
        frontier.score = size_weight * norm_size - distance_weight * norm_dist;
    }
}
