//! Coarse shape classification of obstacle footprints.
//!
//! Fits a superellipse model to the member-cell centers: exponent 1 is a
//! circle, a large exponent approaches a rectangle. The score is the mean
//! `tanh` of the algebraic residual, so 0 is a perfect fit and 1 is no fit.

use serde::Serialize;
use std::f32::consts::FRAC_PI_2;

use crate::core::WorldPoint;

/// Exponent used for the rectangle model.
const RECT_EXPONENT: f32 = 6.0;
/// Circle fits scoring below this are accepted without trying a rectangle.
const CIRCLE_ACCEPT_SCORE: f32 = 0.01;
/// Rotation steps searched over [0, π/2).
const ROTATION_STEPS: usize = 18;
/// Center offsets searched per axis for the circle (in quarter cells).
const CENTER_STEPS: i32 = 2;

/// Shape estimate of an obstacle footprint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ShapeEstimate {
    Circle {
        center: WorldPoint,
        radius: f32,
        score: f32,
    },
    Rectangle {
        center: WorldPoint,
        /// Extent along `rotation`
        length: f32,
        /// Extent across `rotation`
        width: f32,
        /// Orientation of the long side, in (-π/2, π/2]
        rotation: f32,
        score: f32,
    },
}

impl ShapeEstimate {
    pub fn center(&self) -> WorldPoint {
        match *self {
            ShapeEstimate::Circle { center, .. } | ShapeEstimate::Rectangle { center, .. } => {
                center
            }
        }
    }

    /// Fit residual (0 is perfect).
    pub fn score(&self) -> f32 {
        match *self {
            ShapeEstimate::Circle { score, .. } | ShapeEstimate::Rectangle { score, .. } => score,
        }
    }
}

/// Classify a set of cell centers as a circle or a rectangle.
///
/// Returns `None` for fewer than three points. Dimensions describe the
/// footprint including half a cell beyond the outermost centers.
pub fn estimate_shape(points: &[WorldPoint], resolution: f32) -> Option<ShapeEstimate> {
    if points.len() < 3 || !(resolution > 0.0) {
        return None;
    }
    let min_axis = resolution * 0.5;

    let circle = fit_circle(points, resolution, min_axis);
    if let ShapeEstimate::Circle { score, .. } = circle {
        if score < CIRCLE_ACCEPT_SCORE {
            return Some(circle);
        }
    }

    let rectangle = fit_rectangle(points, resolution, min_axis);
    if circle.score() <= rectangle.score() {
        Some(circle)
    } else {
        Some(rectangle)
    }
}

fn centroid(points: &[WorldPoint]) -> WorldPoint {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    WorldPoint::new(sx / n, sy / n)
}

fn fit_circle(points: &[WorldPoint], resolution: f32, min_axis: f32) -> ShapeEstimate {
    let c0 = centroid(points);
    let step = resolution * 0.25;
    let mut best: Option<(f32, WorldPoint, f32)> = None;

    for i in -CENTER_STEPS..=CENTER_STEPS {
        for j in -CENTER_STEPS..=CENTER_STEPS {
            let center = WorldPoint::new(c0.x + i as f32 * step, c0.y + j as f32 * step);
            let mean_r =
                points.iter().map(|p| p.distance(&center)).sum::<f32>() / points.len() as f32;
            let r = mean_r.max(min_axis);
            let score = superellipse_score(points, center, r, r, 0.0, 1.0);
            if best.map_or(true, |(s, _, _)| score < s) {
                best = Some((score, center, r));
            }
        }
    }

    let (score, center, r) = best.unwrap_or((1.0, c0, min_axis));
    ShapeEstimate::Circle {
        center,
        radius: r + resolution * 0.5,
        score,
    }
}

fn fit_rectangle(points: &[WorldPoint], resolution: f32, min_axis: f32) -> ShapeEstimate {
    let c0 = centroid(points);
    let mut best: Option<(f32, WorldPoint, f32, f32, f32)> = None;

    for k in 0..ROTATION_STEPS {
        let rotation = k as f32 * FRAC_PI_2 / ROTATION_STEPS as f32;
        let (sin, cos) = rotation.sin_cos();

        let (mut r_min, mut r_max) = (f32::MAX, f32::MIN);
        let (mut c_min, mut c_max) = (f32::MAX, f32::MIN);
        for p in points {
            let dx = p.x - c0.x;
            let dy = p.y - c0.y;
            let r = dx * cos + dy * sin;
            let c = dy * cos - dx * sin;
            r_min = r_min.min(r);
            r_max = r_max.max(r);
            c_min = c_min.min(c);
            c_max = c_max.max(c);
        }

        let mid_r = (r_min + r_max) * 0.5;
        let mid_c = (c_min + c_max) * 0.5;
        let center = WorldPoint::new(c0.x + mid_r * cos - mid_c * sin, c0.y + mid_r * sin + mid_c * cos);
        let a = ((r_max - r_min) * 0.5).max(min_axis);
        let b = ((c_max - c_min) * 0.5).max(min_axis);

        let score = superellipse_score(points, center, a, b, rotation, RECT_EXPONENT);
        if best.map_or(true, |(s, ..)| score < s) {
            best = Some((score, center, a, b, rotation));
        }
    }

    let (score, center, a, b, rotation) = best.unwrap_or((1.0, c0, min_axis, min_axis, 0.0));
    let (half_length, half_width, rotation) = if a >= b {
        (a, b, rotation)
    } else {
        (b, a, rotation + FRAC_PI_2)
    };
    let rotation = if rotation > FRAC_PI_2 {
        rotation - std::f32::consts::PI
    } else {
        rotation
    };

    ShapeEstimate::Rectangle {
        center,
        length: 2.0 * half_length + resolution,
        width: 2.0 * half_width + resolution,
        rotation,
        score,
    }
}

/// Mean residual of `points` against the superellipse
/// `|r/a|^(2s) + |c/b|^(2s) = 1` centered at `center` and rotated by `rotation`.
fn superellipse_score(
    points: &[WorldPoint],
    center: WorldPoint,
    a: f32,
    b: f32,
    rotation: f32,
    s: f32,
) -> f32 {
    let (sin, cos) = rotation.sin_cos();
    let exponent = 2.0 * s;
    let total: f32 = points
        .iter()
        .map(|p| {
            let dx = p.x - center.x;
            let dy = p.y - center.y;
            let r = dx * cos + dy * sin;
            let c = dy * cos - dx * sin;
            let sum = (r / a).abs().powf(exponent) + (c / b).abs().powf(exponent);
            if sum < 1e-9 {
                1.0
            } else {
                ((sum - 1.0) * (sum - 1.0) / sum / s).tanh()
            }
        })
        .sum();
    total / points.len() as f32
}
