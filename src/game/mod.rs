pub mod action;
pub mod deck;
pub mod error;
pub mod events;
pub mod inventory;
pub mod resources;
pub mod session;
pub mod setup;
pub mod state;

pub use action::{Action, ActionKind, ActionType, DevCardPlay};
pub use error::{ErrorClass, GameError};
pub use events::GameEvent;
pub use inventory::{Inventory, Piece, PrivateView, PublicView};
pub use resources::{
    COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceBundle, ResourceError,
};
pub use session::{AiTurn, ConfigError, Controller, GameConfig, GameSession, SessionId};
pub use state::{GameState, Phase, RobberStep};
