use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Resource;

/// Fixed five-kind resource vector, zero-filled. Used for hands, costs,
/// discards, trade wishes, offers and bids alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceBundle {
    counts: [u8; Resource::ALL.len()],
}

impl Default for ResourceBundle {
    fn default() -> Self {
        Self::zero()
    }
}

impl ResourceBundle {
    pub const fn from_counts(counts: [u8; 5]) -> Self {
        Self { counts }
    }

    pub const fn zero() -> Self {
        Self {
            counts: [0; Resource::ALL.len()],
        }
    }

    pub fn single(resource: Resource, amount: u8) -> Self {
        let mut bundle = Self::zero();
        bundle.add(resource, amount);
        bundle
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&v| v as u32).sum()
    }

    pub fn add(&mut self, resource: Resource, amount: u8) {
        let idx = resource.index();
        self.counts[idx] = self.counts[idx].saturating_add(amount);
    }

    pub fn add_bundle(&mut self, other: &ResourceBundle) {
        for (idx, value) in other.counts.iter().enumerate() {
            self.counts[idx] = self.counts[idx].saturating_add(*value);
        }
    }

    pub fn subtract(&mut self, resource: Resource, amount: u8) -> Result<(), ResourceError> {
        let idx = resource.index();
        if self.counts[idx] < amount {
            return Err(ResourceError::InsufficientResource {
                resource,
                available: self.counts[idx],
                requested: amount,
            });
        }
        self.counts[idx] -= amount;
        Ok(())
    }

    pub fn subtract_bundle(&mut self, other: &ResourceBundle) -> Result<(), ResourceError> {
        if let Some((resource, available, requested)) = self.first_shortfall(other) {
            return Err(ResourceError::InsufficientResource {
                resource,
                available,
                requested,
            });
        }
        for (idx, value) in other.counts.iter().enumerate() {
            self.counts[idx] -= *value;
        }
        Ok(())
    }

    pub fn can_afford(&self, other: &ResourceBundle) -> bool {
        self.first_shortfall(other).is_none()
    }

    fn first_shortfall(&self, other: &ResourceBundle) -> Option<(Resource, u8, u8)> {
        Resource::ALL
            .into_iter()
            .zip(self.counts.iter().zip(other.counts.iter()))
            .find(|(_, (have, need))| have < need)
            .map(|(resource, (have, need))| (resource, *have, *need))
    }

    /// Per-kind shortfall of `self` against `need`, zero where covered.
    pub fn missing_for(&self, need: &ResourceBundle) -> ResourceBundle {
        let mut missing = ResourceBundle::zero();
        for (idx, (have, want)) in self.counts.iter().zip(need.counts.iter()).enumerate() {
            missing.counts[idx] = want.saturating_sub(*have);
        }
        missing
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&value| value == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, u8)> + '_ {
        Resource::ALL.into_iter().zip(self.counts.iter().copied())
    }

    /// Kinds with a non-zero count, in `Resource::ALL` order.
    pub fn kinds(&self) -> impl Iterator<Item = Resource> + '_ {
        self.iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(resource, _)| resource)
    }

    pub fn counts(&self) -> [u8; Resource::ALL.len()] {
        self.counts
    }

    pub fn get(&self, resource: Resource) -> u8 {
        self.counts[resource.index()]
    }
}

impl fmt::Display for ResourceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];
        for (resource, amount) in self.iter() {
            if amount > 0 {
                parts.push(format!("{amount}x{resource}"));
            }
        }
        write!(f, "{}", parts.join(", "))
    }
}

impl FromIterator<(Resource, u8)> for ResourceBundle {
    fn from_iter<I: IntoIterator<Item = (Resource, u8)>>(iter: I) -> Self {
        let mut bundle = ResourceBundle::zero();
        for (resource, amount) in iter {
            bundle.add(resource, amount);
        }
        bundle
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("insufficient {resource:?}: have {available}, need {requested}")]
    InsufficientResource {
        resource: Resource,
        available: u8,
        requested: u8,
    },
}

pub const COST_ROAD: ResourceBundle = ResourceBundle::from_counts([1, 1, 0, 0, 0]);
pub const COST_SETTLEMENT: ResourceBundle = ResourceBundle::from_counts([1, 1, 1, 1, 0]);
pub const COST_CITY: ResourceBundle = ResourceBundle::from_counts([0, 0, 0, 2, 3]);
pub const COST_DEVELOPMENT: ResourceBundle = ResourceBundle::from_counts([0, 0, 1, 1, 1]);
