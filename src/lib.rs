#![warn(clippy::all)]
#![deny(rust_2018_idioms)]

pub mod ai;
pub mod board;
pub mod coords;
pub mod game;
pub mod trade;
pub mod types;

pub use board::{Board, BoardVariant};
pub use game::{Action, ActionKind, GameConfig, GameError, GameEvent, GameSession, GameState, Phase};
pub use types::{PlayerId, Resource};
