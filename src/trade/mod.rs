//! Multi-bidder trade negotiation and the bank exchange rate.
//!
//! A seller publishes a wish and an offer under a caller-chosen code. Any
//! other player may bid while the session is open, in any order, and may
//! replace their bid. The seller settles against one bid or cancels. Nothing
//! waits for every bidder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::game::inventory::Inventory;
use crate::game::resources::ResourceBundle;
use crate::types::{Harbor, PlayerId, Resource};

pub type TradeCode = u32;

/// Ratio for a player with no harbor.
pub const DEFAULT_BANK_RATIO: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TradeStatus {
    Open,
    AwaitingSellerDecision,
    Settled,
    Cancelled,
}

impl TradeStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, TradeStatus::Settled | TradeStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("trade code {0} already used in this session")]
    DuplicateCode(TradeCode),
    #[error("no trade with code {0}")]
    UnknownCode(TradeCode),
    #[error("player {bidder} has no bid on trade {code}")]
    UnknownBidder { code: TradeCode, bidder: PlayerId },
    #[error("trade {code} is {status}")]
    Closed { code: TradeCode, status: TradeStatus },
    #[error("player {player} is not the seller of trade {code}")]
    NotSeller { code: TradeCode, player: PlayerId },
    #[error("seller cannot bid on trade {0}")]
    SellerCannotBid(TradeCode),
    #[error("trade vectors must not be empty")]
    EmptyVector,
    #[error("seller {seller} cannot cover the offer of trade {code}")]
    SellerShort { code: TradeCode, seller: PlayerId },
    #[error("bid of player {bidder} on trade {code} no longer matches their hand")]
    QuantityMismatch { code: TradeCode, bidder: PlayerId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSession {
    pub code: TradeCode,
    pub seller: PlayerId,
    pub wish: ResourceBundle,
    pub offer: ResourceBundle,
    pub status: TradeStatus,
    pub bids: BTreeMap<PlayerId, ResourceBundle>,
}

impl TradeSession {
    fn ensure_open(&self) -> Result<(), TradeError> {
        if self.status == TradeStatus::Open {
            Ok(())
        } else {
            Err(TradeError::Closed {
                code: self.code,
                status: self.status,
            })
        }
    }

    fn ensure_seller(&self, player: PlayerId) -> Result<(), TradeError> {
        if self.seller == player {
            Ok(())
        } else {
            Err(TradeError::NotSeller {
                code: self.code,
                player,
            })
        }
    }
}

/// Result of a successful settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub code: TradeCode,
    pub seller: PlayerId,
    pub bidder: PlayerId,
    pub offer: ResourceBundle,
    pub bid: ResourceBundle,
}

/// Every trade session of one game. Codes stay reserved after a session
/// closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBook {
    sessions: BTreeMap<TradeCode, TradeSession>,
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest code above every code used so far.
    pub fn next_code(&self) -> TradeCode {
        self.sessions
            .keys()
            .next_back()
            .map(|code| code + 1)
            .unwrap_or(1)
    }

    pub fn get(&self, code: TradeCode) -> Option<&TradeSession> {
        self.sessions.get(&code)
    }

    fn session_mut(&mut self, code: TradeCode) -> Result<&mut TradeSession, TradeError> {
        self.sessions
            .get_mut(&code)
            .ok_or(TradeError::UnknownCode(code))
    }

    pub fn open_sessions(&self) -> impl Iterator<Item = &TradeSession> {
        self.sessions
            .values()
            .filter(|session| session.status == TradeStatus::Open)
    }

    pub fn open_codes_of(&self, seller: PlayerId) -> Vec<TradeCode> {
        self.open_sessions()
            .filter(|session| session.seller == seller)
            .map(|session| session.code)
            .collect()
    }

    pub fn validate_open(
        &self,
        code: TradeCode,
        wish: &ResourceBundle,
        offer: &ResourceBundle,
    ) -> Result<(), TradeError> {
        if self.sessions.contains_key(&code) {
            return Err(TradeError::DuplicateCode(code));
        }
        if wish.is_empty() || offer.is_empty() {
            return Err(TradeError::EmptyVector);
        }
        Ok(())
    }

    pub fn open(
        &mut self,
        code: TradeCode,
        seller: PlayerId,
        wish: ResourceBundle,
        offer: ResourceBundle,
    ) -> Result<&TradeSession, TradeError> {
        self.validate_open(code, &wish, &offer)?;
        debug!(code, seller, %wish, %offer, "trade opened");
        let session = self.sessions.entry(code).or_insert(TradeSession {
            code,
            seller,
            wish,
            offer,
            status: TradeStatus::Open,
            bids: BTreeMap::new(),
        });
        Ok(&*session)
    }

    /// Record or replace `bidder`'s bid. Holdings are only checked when the
    /// seller settles.
    pub fn bid(
        &mut self,
        code: TradeCode,
        bidder: PlayerId,
        bid: ResourceBundle,
    ) -> Result<(), TradeError> {
        let session = self.session_mut(code)?;
        session.ensure_open()?;
        if session.seller == bidder {
            return Err(TradeError::SellerCannotBid(code));
        }
        if bid.is_empty() {
            return Err(TradeError::EmptyVector);
        }
        session.bids.insert(bidder, bid);
        debug!(code, bidder, %bid, bids = session.bids.len(), "bid recorded");
        Ok(())
    }

    /// Reject every bid, or withdraw before any arrived.
    pub fn cancel(&mut self, code: TradeCode, player: PlayerId) -> Result<(), TradeError> {
        let session = self.session_mut(code)?;
        session.ensure_seller(player)?;
        if session.status.is_closed() {
            return Err(TradeError::Closed {
                code,
                status: session.status,
            });
        }
        session.status = TradeStatus::Cancelled;
        debug!(code, bids = session.bids.len(), "trade cancelled");
        Ok(())
    }

    /// Checks that do not depend on hands. On success the session is awaiting
    /// the seller's decision.
    pub fn begin_decision(
        &mut self,
        code: TradeCode,
        seller: PlayerId,
        bidder: PlayerId,
    ) -> Result<(), TradeError> {
        let session = self.session_mut(code)?;
        session.ensure_seller(seller)?;
        session.ensure_open()?;
        if !session.bids.contains_key(&bidder) {
            return Err(TradeError::UnknownBidder { code, bidder });
        }
        session.status = TradeStatus::AwaitingSellerDecision;
        Ok(())
    }

    /// Exchange the seller's offer for one bid. Either both inventories
    /// change or neither does. A bid the bidder can no longer cover is
    /// removed and the session reopens; a short seller reopens it untouched.
    pub fn settle(
        &mut self,
        code: TradeCode,
        bidder: PlayerId,
        inventories: &mut [Inventory],
    ) -> Result<Settlement, TradeError> {
        let session = self.session_mut(code)?;
        if session.status != TradeStatus::AwaitingSellerDecision {
            return Err(TradeError::Closed {
                code,
                status: session.status,
            });
        }
        let seller = session.seller;
        let offer = session.offer;
        let Some(bid) = session.bids.get(&bidder).copied() else {
            session.status = TradeStatus::Open;
            return Err(TradeError::UnknownBidder { code, bidder });
        };

        let (Some(seller_inv), Some(bidder_inv)) =
            (inventories.get(seller), inventories.get(bidder))
        else {
            session.status = TradeStatus::Open;
            return Err(TradeError::UnknownBidder { code, bidder });
        };
        let mut seller_after = seller_inv.clone();
        let mut bidder_after = bidder_inv.clone();

        if bidder_after.decrease_bundle(&bid).is_err() {
            session.bids.remove(&bidder);
            session.status = TradeStatus::Open;
            debug!(code, bidder, "bid voided on settlement");
            return Err(TradeError::QuantityMismatch { code, bidder });
        }
        if seller_after.decrease_bundle(&offer).is_err() {
            session.status = TradeStatus::Open;
            return Err(TradeError::SellerShort { code, seller });
        }
        seller_after.increase_bundle(&bid);
        bidder_after.increase_bundle(&offer);
        inventories[seller] = seller_after;
        inventories[bidder] = bidder_after;
        session.status = TradeStatus::Settled;
        debug!(code, seller, bidder, "trade settled");

        Ok(Settlement {
            code,
            seller,
            bidder,
            offer,
            bid,
        })
    }

    /// Cancel every open trade of `seller`, returning the codes touched.
    pub fn cancel_all_of(&mut self, seller: PlayerId) -> Vec<TradeCode> {
        let codes = self.open_codes_of(seller);
        for code in &codes {
            if let Some(session) = self.sessions.get_mut(code) {
                session.status = TradeStatus::Cancelled;
            }
        }
        codes
    }
}

/// Cards of `give` the bank wants for one card of another kind, given the
/// harbors the player occupies.
pub fn bank_ratio(harbors: &[Harbor], give: Resource) -> u8 {
    harbors
        .iter()
        .filter_map(|harbor| harbor.ratio_for(give))
        .min()
        .unwrap_or(DEFAULT_BANK_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hands(counts: &[[u8; 5]]) -> Vec<Inventory> {
        counts
            .iter()
            .enumerate()
            .map(|(id, counts)| {
                let mut inventory = Inventory::player(id);
                inventory.increase_bundle(&ResourceBundle::from_counts(*counts));
                inventory
            })
            .collect()
    }

    fn wood() -> ResourceBundle {
        ResourceBundle::single(Resource::Wood, 1)
    }

    fn ore() -> ResourceBundle {
        ResourceBundle::single(Resource::Ore, 1)
    }

    #[test]
    fn duplicate_code_rejected_even_after_close() {
        let mut book = TradeBook::new();
        book.open(7, 0, wood(), ore()).unwrap();
        assert_eq!(book.open(7, 1, wood(), ore()).unwrap_err(), TradeError::DuplicateCode(7));
        book.cancel(7, 0).unwrap();
        assert_eq!(book.open(7, 0, wood(), ore()).unwrap_err(), TradeError::DuplicateCode(7));
        assert_eq!(book.next_code(), 8);
    }

    #[test]
    fn bids_replace_and_seller_cannot_bid() {
        let mut book = TradeBook::new();
        book.open(1, 0, wood(), ore()).unwrap();
        book.bid(1, 2, wood()).unwrap();
        book.bid(1, 2, ResourceBundle::single(Resource::Wood, 2)).unwrap();
        assert_eq!(book.get(1).unwrap().bids.len(), 1);
        assert_eq!(book.bid(1, 0, wood()), Err(TradeError::SellerCannotBid(1)));
    }

    #[test]
    fn settlement_exchanges_with_one_bidder_only() {
        let mut inventories = hands(&[[0, 0, 0, 0, 1], [1, 0, 0, 0, 0], [2, 0, 0, 0, 0]]);
        let mut book = TradeBook::new();
        book.open(3, 0, wood(), ore()).unwrap();
        book.bid(3, 1, wood()).unwrap();
        book.bid(3, 2, ResourceBundle::single(Resource::Wood, 2)).unwrap();

        book.begin_decision(3, 0, 2).unwrap();
        let settlement = book.settle(3, 2, &mut inventories).unwrap();
        assert_eq!(settlement.bidder, 2);
        assert_eq!(inventories[0].resources().counts(), [2, 0, 0, 0, 0]);
        assert_eq!(inventories[1].resources().counts(), [1, 0, 0, 0, 0]);
        assert_eq!(inventories[2].resources().counts(), [0, 0, 0, 0, 1]);
        assert_eq!(book.get(3).unwrap().status, TradeStatus::Settled);
        assert!(matches!(book.bid(3, 1, wood()), Err(TradeError::Closed { .. })));
    }

    #[test]
    fn mismatch_voids_only_that_bid() {
        let mut inventories = hands(&[[0, 0, 0, 0, 1], [0, 0, 0, 0, 0], [1, 0, 0, 0, 0]]);
        let mut book = TradeBook::new();
        book.open(4, 0, wood(), ore()).unwrap();
        book.bid(4, 1, wood()).unwrap();
        book.bid(4, 2, wood()).unwrap();

        book.begin_decision(4, 0, 1).unwrap();
        assert_eq!(
            book.settle(4, 1, &mut inventories),
            Err(TradeError::QuantityMismatch { code: 4, bidder: 1 })
        );
        let session = book.get(4).unwrap();
        assert_eq!(session.status, TradeStatus::Open);
        assert!(!session.bids.contains_key(&1));
        assert!(session.bids.contains_key(&2));
        assert_eq!(inventories[0].resources().counts(), [0, 0, 0, 0, 1]);

        book.begin_decision(4, 0, 2).unwrap();
        book.settle(4, 2, &mut inventories).unwrap();
    }

    #[test]
    fn only_seller_decides() {
        let mut book = TradeBook::new();
        book.open(5, 0, wood(), ore()).unwrap();
        book.bid(5, 1, wood()).unwrap();
        assert_eq!(
            book.begin_decision(5, 1, 1),
            Err(TradeError::NotSeller { code: 5, player: 1 })
        );
        assert_eq!(
            book.begin_decision(5, 0, 3),
            Err(TradeError::UnknownBidder { code: 5, bidder: 3 })
        );
        assert_eq!(book.cancel(5, 2), Err(TradeError::NotSeller { code: 5, player: 2 }));
        assert_eq!(book.cancel_all_of(0), vec![5]);
        assert_eq!(book.open_sessions().count(), 0);
    }

    #[test]
    fn bank_ratio_uses_best_harbor() {
        assert_eq!(bank_ratio(&[], Resource::Ore), 4);
        assert_eq!(bank_ratio(&[Harbor::Generic], Resource::Ore), 3);
        assert_eq!(
            bank_ratio(&[Harbor::Generic, Harbor::Special(Resource::Ore)], Resource::Ore),
            2
        );
        assert_eq!(bank_ratio(&[Harbor::Special(Resource::Wood)], Resource::Ore), 4);
    }
}
