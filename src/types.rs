use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Seat index of a player inside one session.
pub type PlayerId = usize;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Resource {
    Wood,
    Brick,
    Sheep,
    Wheat,
    Ore,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Brick,
        Resource::Sheep,
        Resource::Wheat,
        Resource::Ore,
    ];

    pub const fn index(self) -> usize {
        match self {
            Resource::Wood => 0,
            Resource::Brick => 1,
            Resource::Sheep => 2,
            Resource::Wheat => 3,
            Resource::Ore => 4,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DevelopmentCard {
    Knight,
    YearOfPlenty,
    Monopoly,
    RoadBuilding,
    VictoryPoint,
}

impl DevelopmentCard {
    /// Cards that can be played from the hand. Victory points only score.
    pub const PLAYABLE: [DevelopmentCard; 4] = [
        DevelopmentCard::Knight,
        DevelopmentCard::YearOfPlenty,
        DevelopmentCard::Monopoly,
        DevelopmentCard::RoadBuilding,
    ];

    pub fn is_playable(self) -> bool {
        !matches!(self, DevelopmentCard::VictoryPoint)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Terrain {
    Water,
    Desert,
    Forest,
    Hills,
    Pasture,
    Fields,
    Mountains,
}

impl Terrain {
    pub fn resource(self) -> Option<Resource> {
        match self {
            Terrain::Forest => Some(Resource::Wood),
            Terrain::Hills => Some(Resource::Brick),
            Terrain::Pasture => Some(Resource::Sheep),
            Terrain::Fields => Some(Resource::Wheat),
            Terrain::Mountains => Some(Resource::Ore),
            Terrain::Water | Terrain::Desert => None,
        }
    }

    pub fn is_land(self) -> bool {
        !matches!(self, Terrain::Water)
    }
}

/// Trade ratio a harbor vertex grants its owner when dealing with the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Harbor {
    Generic,
    Special(Resource),
}

impl Harbor {
    pub fn ratio_for(self, resource: Resource) -> Option<u8> {
        match self {
            Harbor::Generic => Some(3),
            Harbor::Special(kind) if kind == resource => Some(2),
            Harbor::Special(_) => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingLevel {
    Settlement,
    City,
}

impl BuildingLevel {
    pub fn yield_multiplier(self) -> u8 {
        match self {
            BuildingLevel::Settlement => 1,
            BuildingLevel::City => 2,
        }
    }

    pub fn victory_points(self) -> u8 {
        match self {
            BuildingLevel::Settlement => 1,
            BuildingLevel::City => 2,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Achievement {
    LongestRoad,
    LargestArmy,
}

impl Achievement {
    /// Smallest value that can hold the flag at all.
    pub fn threshold(self) -> u8 {
        match self {
            Achievement::LongestRoad => 5,
            Achievement::LargestArmy => 3,
        }
    }
}
