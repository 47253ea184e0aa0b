//! Velocity command emitted by the motion controller.

use serde::{Deserialize, Serialize};

/// Linear (m/s) and angular (rad/s) velocity for a differential-drive base.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear: f32,
    pub angular: f32,
}

impl VelocityCommand {
    pub const ZERO: VelocityCommand = VelocityCommand {
        linear: 0.0,
        angular: 0.0,
    };

    #[inline]
    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }

    /// Clamp both components to their symmetric limits.
    #[inline]
    pub fn clamped(self, max_linear: f32, max_angular: f32) -> Self {
        Self {
            linear: self.linear.clamp(-max_linear, max_linear),
            angular: self.angular.clamp(-max_angular, max_angular),
        }
    }
}
