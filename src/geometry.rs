/**
 * Enum to hold a unit vector along one of the three Cartesian axes
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    X,
    Y,
    Z,
}




// ============================================================================
impl Direction {
    /// Return the axis index (0, 1 or 2) of this direction.
    pub fn axis(&self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }

    pub fn from_axis(axis: usize) -> Direction {
        match axis {
            0 => Direction::X,
            1 => Direction::Y,
            _ => Direction::Z,
        }
    }
}
