//! Obstacle extraction.
//!
//! Groups Occupied cells into 8-connected components and summarizes each as
//! an [`Obstacle`] (bounding box, centroid, radius and a coarse shape).

mod extractor;
mod shape;

pub use extractor::{Extraction, ExtractorConfig, Obstacle, ObstacleExtractor, ObstacleKind};
pub use shape::{estimate_shape, ShapeEstimate};
