use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
    NorthEast,
}

impl Direction {
    /// Order in which a ring is walked once positioned on its south-west corner.
    pub const RING_WALK: [Direction; 6] = [
        Direction::East,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
            Direction::NorthEast => Direction::SouthWest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CubeCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        debug_assert!(x + y + z == 0, "cube coordinates must sum to zero");
        Self { x, y, z }
    }

    pub fn add(self, other: CubeCoord) -> Self {
        CubeCoord::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(self, factor: i32) -> Self {
        CubeCoord::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn neighbor(self, direction: Direction) -> Self {
        self.add(unit_vector(direction))
    }

    /// Distance in rings from the origin.
    pub fn ring_index(self) -> u32 {
        self.x.unsigned_abs().max(self.y.unsigned_abs()).max(self.z.unsigned_abs())
    }
}

impl Default for CubeCoord {
    fn default() -> Self {
        CubeCoord::new(0, 0, 0)
    }
}

pub static UNIT_VECTORS: Lazy<HashMap<Direction, CubeCoord>> = Lazy::new(|| {
    use Direction::*;
    HashMap::from([
        (NorthEast, CubeCoord::new(1, 0, -1)),
        (SouthWest, CubeCoord::new(-1, 0, 1)),
        (NorthWest, CubeCoord::new(0, 1, -1)),
        (SouthEast, CubeCoord::new(0, -1, 1)),
        (East, CubeCoord::new(1, -1, 0)),
        (West, CubeCoord::new(-1, 1, 0)),
    ])
});

pub fn unit_vector(direction: Direction) -> CubeCoord {
    UNIT_VECTORS[&direction]
}

/// Coordinates of one ring around the origin, walked counter-clockwise from
/// its south-west corner. Ring 0 is the origin alone.
pub fn ring(radius: u32) -> Vec<CubeCoord> {
    if radius == 0 {
        return vec![CubeCoord::default()];
    }
    let radius = radius as i32;
    let mut coords = Vec::with_capacity(6 * radius as usize);
    let mut cursor = unit_vector(Direction::SouthWest).scale(radius);
    for direction in Direction::RING_WALK {
        for _ in 0..radius {
            coords.push(cursor);
            cursor = cursor.neighbor(direction);
        }
    }
    coords
}

/// Origin followed by rings `1..=rings`, in walking order.
pub fn spiral(rings: u32) -> Vec<CubeCoord> {
    (0..=rings).flat_map(ring).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ring_sizes_follow_six_per_layer() {
        assert_eq!(ring(0).len(), 1);
        for radius in 1..=5 {
            let coords = ring(radius);
            assert_eq!(coords.len(), 6 * radius as usize);
            assert!(coords.iter().all(|c| c.ring_index() == radius));
            let unique: HashSet<_> = coords.iter().collect();
            assert_eq!(unique.len(), coords.len());
        }
    }

    #[test]
    fn spiral_covers_center_and_five_rings() {
        assert_eq!(spiral(5).len(), 91);
        assert_eq!(spiral(2).len(), 19);
    }

    #[test]
    fn opposite_direction_cancels_out() {
        let origin = CubeCoord::default();
        for direction in Direction::RING_WALK {
            assert_eq!(origin.neighbor(direction).neighbor(direction.opposite()), origin);
        }
    }
}
