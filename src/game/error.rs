use strum::Display;

use crate::board::PlacementError;
use crate::game::action::ActionType;
use crate::game::inventory::{InventoryError, Piece};
use crate::game::resources::ResourceError;
use crate::game::session::SessionId;
use crate::game::state::Phase;
use crate::trade::{TradeCode, TradeError};
use crate::types::{DevelopmentCard, PlayerId};

/// Coarse grouping callers use to decide how to react to a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorClass {
    /// Bad input for the current state. Nothing changed.
    Validation,
    /// Malformed or misaddressed request. Nothing changed.
    Protocol,
    /// The engine itself is inconsistent. The session stops.
    Invariant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("invalid placement: {0}")]
    InvalidPlacement(#[from] PlacementError),
    #[error("{action} is not allowed during {phase}")]
    IllegalPhaseTransition { phase: Phase, action: ActionType },
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("bid of player {bidder} on trade {code} does not match their hand")]
    TradeQuantityMismatch { code: TradeCode, bidder: PlayerId },

    #[error("action addressed to session {0}")]
    WrongSession(SessionId),
    #[error("no player {0} in this session")]
    UnknownPlayer(PlayerId),
    #[error("not player {0}'s turn")]
    NotYourTurn(PlayerId),
    #[error("trade code {0} already used")]
    DuplicateTradeCode(TradeCode),
    #[error("no trade with code {0}")]
    UnknownTradeCode(TradeCode),
    #[error("player {bidder} has no bid on trade {code}")]
    UnknownBidder { code: TradeCode, bidder: PlayerId },
    #[error("trade {0} is closed")]
    TradeClosed(TradeCode),
    #[error("player {player} does not own trade {code}")]
    NotTradeSeller { code: TradeCode, player: PlayerId },
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
    #[error("{0} card cannot be played now")]
    DevelopmentCardUnavailable(DevelopmentCard),
    #[error("development deck is empty")]
    DeckExhausted,
    #[error("bank cannot pay out")]
    BankExhausted,
    #[error("no {0} pieces left")]
    OutOfStock(Piece),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("session aborted after an invariant violation")]
    SessionAborted,
}

impl GameError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GameError::InvalidPlacement(_)
            | GameError::IllegalPhaseTransition { .. }
            | GameError::InsufficientResources
            | GameError::TradeQuantityMismatch { .. } => ErrorClass::Validation,
            GameError::InvariantViolation(_) | GameError::SessionAborted => ErrorClass::Invariant,
            _ => ErrorClass::Protocol,
        }
    }
}

impl From<ResourceError> for GameError {
    fn from(_: ResourceError) -> Self {
        GameError::InsufficientResources
    }
}

impl From<InventoryError> for GameError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Resources(_) => GameError::InsufficientResources,
            InventoryError::NoPlayableCard(card) => GameError::DevelopmentCardUnavailable(card),
            InventoryError::OutOfStock(piece) => GameError::OutOfStock(piece),
        }
    }
}

impl From<TradeError> for GameError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::DuplicateCode(code) => GameError::DuplicateTradeCode(code),
            TradeError::UnknownCode(code) => GameError::UnknownTradeCode(code),
            TradeError::UnknownBidder { code, bidder } => GameError::UnknownBidder { code, bidder },
            TradeError::Closed { code, .. } => GameError::TradeClosed(code),
            TradeError::NotSeller { code, player } => GameError::NotTradeSeller { code, player },
            TradeError::SellerCannotBid(_) => GameError::InvalidPayload("seller cannot bid"),
            TradeError::EmptyVector => GameError::InvalidPayload("empty trade vector"),
            TradeError::SellerShort { .. } => GameError::InsufficientResources,
            TradeError::QuantityMismatch { code, bidder } => {
                GameError::TradeQuantityMismatch { code, bidder }
            }
        }
    }
}
