//! Cell classification.

use serde::{Deserialize, Serialize};

/// State of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellState {
    #[default]
    Unknown = 0,
    Free = 1,
    Occupied = 2,
}

impl CellState {
    /// Classify a ROS-style occupancy value.
    ///
    /// Negative values are unknown, values strictly above `occupied_threshold`
    /// are occupied, everything else is free.
    #[inline]
    pub fn from_occupancy(value: i8, occupied_threshold: i8) -> Self {
        if value < 0 {
            CellState::Unknown
        } else if value > occupied_threshold {
            CellState::Occupied
        } else {
            CellState::Free
        }
    }

    /// ROS-style occupancy value for this state (0 free, 100 occupied, -1 unknown).
    #[inline]
    pub fn to_occupancy(self) -> i8 {
        match self {
            CellState::Unknown => -1,
            CellState::Free => 0,
            CellState::Occupied => 100,
        }
    }

    /// Character used by the ASCII map format.
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            CellState::Unknown => '?',
            CellState::Free => '.',
            CellState::Occupied => '#',
        }
    }

    #[inline]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(CellState::Unknown),
            '.' => Some(CellState::Free),
            '#' => Some(CellState::Occupied),
            _ => None,
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != CellState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_occupancy_threshold() {
        assert_eq!(CellState::from_occupancy(-1, 3), CellState::Unknown);
        assert_eq!(CellState::from_occupancy(-100, 3), CellState::Unknown);
        assert_eq!(CellState::from_occupancy(0, 3), CellState::Free);
        assert_eq!(CellState::from_occupancy(3, 3), CellState::Free);
        assert_eq!(CellState::from_occupancy(4, 3), CellState::Occupied);
        assert_eq!(CellState::from_occupancy(100, 3), CellState::Occupied);
    }

    #[test]
    fn test_char_mapping() {
        for state in [CellState::Unknown, CellState::Free, CellState::Occupied] {
            assert_eq!(CellState::from_char(state.as_char()), Some(state));
            assert_eq!(CellState::from_occupancy(state.to_occupancy(), 3), state);
        }
        assert_eq!(CellState::from_char('x'), None);
    }
}
