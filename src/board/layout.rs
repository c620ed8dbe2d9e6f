use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::types::{Harbor, Resource, Terrain};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardVariant {
    /// Fixed terrain, number and harbor arrangement.
    #[default]
    Standard,
    /// Same multisets as `Standard`, shuffled.
    Randomized,
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BoardVariant::Standard => "standard",
            BoardVariant::Randomized => "randomized",
        };
        write!(f, "{label}")
    }
}

impl FromStr for BoardVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "base" => Ok(BoardVariant::Standard),
            "randomized" | "random" => Ok(BoardVariant::Randomized),
            _ => Err(format!("unknown board variant: {s}")),
        }
    }
}

/// Terrain and yield number for every land tile in spiral order (center
/// first), plus harbor kinds in coastal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout {
    pub land: Vec<(Terrain, Option<u8>)>,
    pub harbors: Vec<Harbor>,
}

impl BoardLayout {
    pub fn standard() -> Self {
        STANDARD_LAYOUT.clone()
    }

    pub fn for_variant(variant: BoardVariant, rng: &mut impl rand::Rng) -> Self {
        match variant {
            BoardVariant::Standard => Self::standard(),
            BoardVariant::Randomized => Self::shuffled(rng),
        }
    }

    /// Draws terrains, numbers and harbors without replacement from the
    /// standard multisets. The desert stays on the center tile.
    pub fn shuffled(rng: &mut impl rand::Rng) -> Self {
        let mut terrains = STANDARD_TERRAINS.to_vec();
        let mut numbers = STANDARD_NUMBERS.to_vec();
        let mut harbors = STANDARD_HARBORS.to_vec();
        terrains.shuffle(rng);
        numbers.shuffle(rng);
        harbors.shuffle(rng);
        Self::assemble(&terrains, &numbers, harbors)
    }

    fn assemble(terrains: &[Terrain], numbers: &[u8], harbors: Vec<Harbor>) -> Self {
        let mut land = Vec::with_capacity(terrains.len() + 1);
        land.push((Terrain::Desert, None));
        land.extend(
            terrains
                .iter()
                .zip(numbers.iter())
                .map(|(terrain, number)| (*terrain, Some(*number))),
        );
        Self { land, harbors }
    }
}

const STANDARD_TERRAINS: [Terrain; 18] = {
    use Terrain::*;
    [
        // ring 1
        Fields, Pasture, Forest, Hills, Mountains, Pasture,
        // ring 2
        Forest, Fields, Mountains, Pasture, Hills, Forest, Fields, Pasture, Mountains, Hills,
        Forest, Fields,
    ]
};

const STANDARD_NUMBERS: [u8; 18] = [9, 4, 10, 5, 3, 11, 6, 2, 8, 12, 3, 10, 5, 9, 4, 11, 6, 8];

const STANDARD_HARBORS: [Harbor; 9] = [
    Harbor::Generic,
    Harbor::Special(Resource::Sheep),
    Harbor::Generic,
    Harbor::Special(Resource::Ore),
    Harbor::Special(Resource::Wheat),
    Harbor::Generic,
    Harbor::Special(Resource::Wood),
    Harbor::Special(Resource::Brick),
    Harbor::Generic,
];

static STANDARD_LAYOUT: Lazy<BoardLayout> = Lazy::new(|| {
    BoardLayout::assemble(&STANDARD_TERRAINS, &STANDARD_NUMBERS, STANDARD_HARBORS.to_vec())
});
