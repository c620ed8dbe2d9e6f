use serde::{Deserialize, Serialize};

use crate::board::{EdgeId, TileId, VertexId};
use crate::game::inventory::{PrivateView, PublicView};
use crate::game::resources::ResourceBundle;
use crate::game::state::Phase;
use crate::trade::{TradeCode, TradeStatus};
use crate::types::{Achievement, BuildingLevel, DevelopmentCard, PlayerId, Resource};

/// Outcome notifications for the coordinator to fan out. Private views go to
/// their owner only; everything else is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    RoadBuilt {
        player: PlayerId,
        edge: EdgeId,
    },
    BuildingPlaced {
        player: PlayerId,
        vertex: VertexId,
        level: BuildingLevel,
    },
    InventoryChanged {
        player: PlayerId,
        private: Box<PrivateView>,
        public: PublicView,
    },
    DiceRolled {
        player: PlayerId,
        dice: (u8, u8),
    },
    ResourcesProduced {
        player: PlayerId,
        bundle: ResourceBundle,
    },
    /// Every claim for `resource` on this roll went unpaid.
    ProductionWithheld {
        resource: Resource,
    },
    DiscardRequired {
        player: PlayerId,
        count: u8,
    },
    Discarded {
        player: PlayerId,
        bundle: ResourceBundle,
    },
    RobberMoved {
        player: PlayerId,
        tile: TileId,
    },
    /// The drawn resource kind is only told to the two players involved.
    ResourceDrawn {
        thief: PlayerId,
        victim: PlayerId,
        resource: Option<Resource>,
    },
    DevelopmentCardBought {
        player: PlayerId,
    },
    DevelopmentCardPlayed {
        player: PlayerId,
        card: DevelopmentCard,
    },
    TradeStateChanged {
        code: TradeCode,
        status: TradeStatus,
    },
    BidReceived {
        code: TradeCode,
        bidder: PlayerId,
    },
    BankTraded {
        player: PlayerId,
        give: ResourceBundle,
        receive: Resource,
    },
    AchievementChanged {
        flag: Achievement,
        holder: Option<PlayerId>,
    },
    PhaseChanged {
        phase: Phase,
    },
    TurnAdvanced {
        player: PlayerId,
        turn: u32,
    },
    GameConcluded {
        winner: PlayerId,
        scores: Vec<u8>,
    },
}
