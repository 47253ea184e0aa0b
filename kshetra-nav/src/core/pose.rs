//! Robot pose in the map frame.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::math::normalize_angle;
use super::point::WorldPoint;

/// 2-D pose (x, y in meters; theta in radians, wrapped to (-π, π]).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    /// Create a pose, wrapping `theta` into (-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// Heading error to face `target`, wrapped into (-π, π].
    #[inline]
    pub fn bearing_to(&self, target: &WorldPoint) -> f32 {
        normalize_angle(self.position().angle_to(target) - self.theta)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

/// A pose together with the instant it was received.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseSample {
    pub pose: Pose2D,
    pub received_at: Instant,
}

impl PoseSample {
    pub fn new(pose: Pose2D, received_at: Instant) -> Self {
        Self { pose, received_at }
    }

    /// Age at `now` (zero if `now` precedes the receive time).
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_pose_wraps_theta() {
        let pose = Pose2D::new(0.0, 0.0, 3.0 * PI / 2.0);
        assert_relative_eq!(pose.theta, -PI / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bearing_to() {
        let pose = Pose2D::new(0.0, 0.0, PI / 2.0);
        let bearing = pose.bearing_to(&WorldPoint::new(1.0, 0.0));
        assert_relative_eq!(bearing, -PI / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sample_age_saturates() {
        let now = Instant::now();
        let sample = PoseSample::new(Pose2D::default(), now + Duration::from_millis(10));
        assert_eq!(sample.age(now), Duration::ZERO);
        assert_eq!(
            sample.age(now + Duration::from_millis(60)),
            Duration::from_millis(50)
        );
    }
}
