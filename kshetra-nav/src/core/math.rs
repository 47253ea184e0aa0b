//! Angle helpers.

use std::f32::consts::{PI, TAU};

/// Wrap an angle into (-π, π].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Signed smallest difference `to - from`, wrapped into (-π, π].
#[inline]
pub fn angle_diff(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_range() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(-PI / 2.0 - TAU), -PI / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_angle_diff_wraps() {
        let d = angle_diff(PI - 0.1, -PI + 0.1);
        assert_relative_eq!(d, 0.2, epsilon = 1e-5);
    }
}
