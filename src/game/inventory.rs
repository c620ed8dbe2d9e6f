use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::game::resources::{ResourceBundle, ResourceError};
use crate::types::{Achievement, DevelopmentCard, PlayerId, Resource};

pub const MAX_ROADS: u8 = 15;
pub const MAX_SETTLEMENTS: u8 = 5;
pub const MAX_CITIES: u8 = 4;
pub const BANK_RESOURCES_PER_KIND: u8 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    Player(PlayerId),
    Bank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Piece {
    Road,
    Settlement,
    City,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error(transparent)]
    Resources(#[from] ResourceError),
    #[error("no playable {0} card in hand")]
    NoPlayableCard(DevelopmentCard),
    #[error("no {0} pieces left")]
    OutOfStock(Piece),
}

/// Remaining building units. Decremented on construction, never replenished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub roads: u8,
    pub settlements: u8,
    pub cities: u8,
}

impl Stock {
    pub const FULL: Stock = Stock {
        roads: MAX_ROADS,
        settlements: MAX_SETTLEMENTS,
        cities: MAX_CITIES,
    };

    pub const EMPTY: Stock = Stock {
        roads: 0,
        settlements: 0,
        cities: 0,
    };

    pub fn remaining(&self, piece: Piece) -> u8 {
        match piece {
            Piece::Road => self.roads,
            Piece::Settlement => self.settlements,
            Piece::City => self.cities,
        }
    }

    fn slot(&mut self, piece: Piece) -> &mut u8 {
        match piece {
            Piece::Road => &mut self.roads,
            Piece::Settlement => &mut self.settlements,
            Piece::City => &mut self.cities,
        }
    }
}

/// Counters for the four playable development card kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevelopmentHand {
    counts: [u8; DevelopmentCard::PLAYABLE.len()],
}

impl DevelopmentHand {
    fn slot(card: DevelopmentCard) -> Option<usize> {
        DevelopmentCard::PLAYABLE.iter().position(|c| *c == card)
    }

    pub fn get(&self, card: DevelopmentCard) -> u8 {
        Self::slot(card).map(|idx| self.counts[idx]).unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }

    fn add(&mut self, card: DevelopmentCard) {
        if let Some(idx) = Self::slot(card) {
            self.counts[idx] = self.counts[idx].saturating_add(1);
        }
    }

    fn take(&mut self, card: DevelopmentCard) -> bool {
        match Self::slot(card) {
            Some(idx) if self.counts[idx] > 0 => {
                self.counts[idx] -= 1;
                true
            }
            _ => false,
        }
    }

    fn absorb(&mut self, other: &mut DevelopmentHand) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter_mut()) {
            *mine = mine.saturating_add(*theirs);
            *theirs = 0;
        }
    }
}

/// Resource and card bookkeeping for one player or the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    owner: Owner,
    resources: ResourceBundle,
    playable: DevelopmentHand,
    fresh: DevelopmentHand,
    victory_point_cards: u8,
    stock: Stock,
    knights_played: u8,
    longest_road_length: u8,
    building_points: u8,
    longest_road: bool,
    largest_army: bool,
}

impl Inventory {
    pub fn player(id: PlayerId) -> Self {
        Self::empty(Owner::Player(id), Stock::FULL)
    }

    pub fn bank() -> Self {
        let mut bank = Self::empty(Owner::Bank, Stock::EMPTY);
        bank.resources = ResourceBundle::from_counts([BANK_RESOURCES_PER_KIND; 5]);
        bank
    }

    fn empty(owner: Owner, stock: Stock) -> Self {
        Self {
            owner,
            resources: ResourceBundle::zero(),
            playable: DevelopmentHand::default(),
            fresh: DevelopmentHand::default(),
            victory_point_cards: 0,
            stock,
            knights_played: 0,
            longest_road_length: 0,
            building_points: 0,
            longest_road: false,
            largest_army: false,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn resources(&self) -> &ResourceBundle {
        &self.resources
    }

    pub fn resource(&self, kind: Resource) -> u8 {
        self.resources.get(kind)
    }

    pub fn resource_count(&self) -> u32 {
        self.resources.total()
    }

    pub fn increase(&mut self, kind: Resource, amount: u8) {
        self.resources.add(kind, amount);
    }

    pub fn decrease(&mut self, kind: Resource, amount: u8) -> Result<(), InventoryError> {
        self.resources.subtract(kind, amount)?;
        Ok(())
    }

    pub fn increase_bundle(&mut self, bundle: &ResourceBundle) {
        self.resources.add_bundle(bundle);
    }

    pub fn decrease_bundle(&mut self, bundle: &ResourceBundle) -> Result<(), InventoryError> {
        self.resources.subtract_bundle(bundle)?;
        Ok(())
    }

    pub fn can_afford(&self, bundle: &ResourceBundle) -> bool {
        self.resources.can_afford(bundle)
    }

    /// Bought cards are held back until the owner's next turn. Victory
    /// point cards score immediately.
    pub fn add_development_card(&mut self, card: DevelopmentCard) {
        if card.is_playable() {
            self.fresh.add(card);
        } else {
            self.victory_point_cards = self.victory_point_cards.saturating_add(1);
        }
    }

    pub fn mature_development_cards(&mut self) {
        self.playable.absorb(&mut self.fresh);
    }

    pub fn playable_count(&self, card: DevelopmentCard) -> u8 {
        self.playable.get(card)
    }

    pub fn fresh_count(&self, card: DevelopmentCard) -> u8 {
        self.fresh.get(card)
    }

    pub fn take_playable(&mut self, card: DevelopmentCard) -> Result<(), InventoryError> {
        if self.playable.take(card) {
            Ok(())
        } else {
            Err(InventoryError::NoPlayableCard(card))
        }
    }

    pub fn record_knight(&mut self) {
        self.knights_played = self.knights_played.saturating_add(1);
    }

    pub fn knights_played(&self) -> u8 {
        self.knights_played
    }

    pub fn stock(&self) -> Stock {
        self.stock
    }

    pub fn has_piece(&self, piece: Piece) -> bool {
        self.stock.remaining(piece) > 0
    }

    pub fn use_piece(&mut self, piece: Piece) -> Result<(), InventoryError> {
        let slot = self.stock.slot(piece);
        if *slot == 0 {
            return Err(InventoryError::OutOfStock(piece));
        }
        *slot -= 1;
        Ok(())
    }

    pub fn longest_road_length(&self) -> u8 {
        self.longest_road_length
    }

    pub fn set_longest_road_length(&mut self, length: u8) {
        self.longest_road_length = length;
    }

    pub fn has_achievement(&self, flag: Achievement) -> bool {
        match flag {
            Achievement::LongestRoad => self.longest_road,
            Achievement::LargestArmy => self.largest_army,
        }
    }

    pub fn set_achievement(&mut self, flag: Achievement, held: bool) {
        match flag {
            Achievement::LongestRoad => self.longest_road = held,
            Achievement::LargestArmy => self.largest_army = held,
        }
    }

    /// Points from settlements and cities on the board. Clamped at zero.
    pub fn adjust_building_points(&mut self, delta: i8) {
        self.building_points = self.building_points.saturating_add_signed(delta);
    }

    pub fn victory_point_cards(&self) -> u8 {
        self.victory_point_cards
    }

    fn bonus_points(&self) -> u8 {
        let mut bonus = 0;
        if self.longest_road {
            bonus += 2;
        }
        if self.largest_army {
            bonus += 2;
        }
        bonus
    }

    pub fn public_points(&self) -> u8 {
        self.building_points.saturating_add(self.bonus_points())
    }

    pub fn victory_points(&self) -> u8 {
        self.public_points().saturating_add(self.victory_point_cards)
    }

    pub fn development_card_count(&self) -> u32 {
        self.playable.total() + self.fresh.total() + self.victory_point_cards as u32
    }

    pub fn private_view(&self) -> PrivateView {
        PrivateView {
            owner: self.owner,
            resources: self.resources,
            playable: self.playable,
            fresh: self.fresh,
            victory_point_cards: self.victory_point_cards,
            development_card_count: self.development_card_count(),
            stock: self.stock,
            knights_played: self.knights_played,
            longest_road_length: self.longest_road_length,
            longest_road: self.longest_road,
            largest_army: self.largest_army,
            victory_points: self.victory_points(),
        }
    }

    pub fn public_view(&self) -> PublicView {
        PublicView {
            owner: self.owner,
            resource_count: self.resources.total(),
            development_card_count: self.playable.total() + self.fresh.total(),
            knights_played: self.knights_played,
            longest_road_length: self.longest_road_length,
            longest_road: self.longest_road,
            largest_army: self.largest_army,
            public_points: self.public_points(),
        }
    }
}

/// Everything the owner may see about their own inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateView {
    pub owner: Owner,
    pub resources: ResourceBundle,
    pub playable: DevelopmentHand,
    pub fresh: DevelopmentHand,
    pub victory_point_cards: u8,
    pub development_card_count: u32,
    pub stock: Stock,
    pub knights_played: u8,
    pub longest_road_length: u8,
    pub longest_road: bool,
    pub largest_army: bool,
    pub victory_points: u8,
}

/// What opponents see: totals only, no card composition. Victory point
/// cards are left out of the development card count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicView {
    pub owner: Owner,
    pub resource_count: u32,
    pub development_card_count: u32,
    pub knights_played: u8,
    pub longest_road_length: u8,
    pub longest_road: bool,
    pub largest_army: bool,
    pub public_points: u8,
}
