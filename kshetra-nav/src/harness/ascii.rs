//! ASCII map format.
//!
//! One row per line with the top line holding the highest `y` row:
//! `.` Free, `#` Occupied, `?` Unknown. Blank lines are ignored and every
//! row must have the same width.

use std::path::Path;

use crate::core::WorldPoint;
use crate::error::{NavError, Result};
use crate::grid::{CellState, OccupancyGrid};

/// Parse an ASCII map into a grid with the given origin and resolution.
pub fn parse_ascii_map(text: &str, origin: WorldPoint, resolution: f32) -> Result<OccupancyGrid> {
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(first) = rows.first() else {
        return Err(NavError::InvalidGrid("ASCII map has no rows".to_string()));
    };
    let width = first.chars().count();
    let height = rows.len();

    let mut cells = vec![CellState::Unknown; width * height];
    for (line_no, row) in rows.iter().enumerate() {
        let y = height - 1 - line_no;
        let mut count = 0;
        for (x, c) in row.chars().enumerate() {
            let state = CellState::from_char(c).ok_or_else(|| {
                NavError::InvalidGrid(format!(
                    "unexpected character {:?} at row {}, column {}",
                    c,
                    line_no + 1,
                    x + 1
                ))
            })?;
            if x < width {
                cells[y * width + x] = state;
            }
            count += 1;
        }
        if count != width {
            return Err(NavError::InvalidGrid(format!(
                "row {} has {} cells, expected {}",
                line_no + 1,
                count,
                width
            )));
        }
    }

    OccupancyGrid::new(origin, resolution, width, height, cells)
}

/// Read and parse an ASCII map file.
pub fn load_ascii_map(path: &Path, resolution: f32) -> Result<OccupancyGrid> {
    let text = std::fs::read_to_string(path)?;
    parse_ascii_map(&text, WorldPoint::ZERO, resolution)
}
