use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants};

use crate::board::{EdgeId, TileId, VertexId};
use crate::game::resources::ResourceBundle;
use crate::game::session::SessionId;
use crate::trade::TradeCode;
use crate::types::{DevelopmentCard, PlayerId, Resource};

/// One request from a seat. Human and AI actions share this shape and the
/// same application path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub session: SessionId,
    pub player: PlayerId,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(session: SessionId, player: PlayerId, kind: ActionKind) -> Self {
        Self {
            session,
            player,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(ActionType), derive(Display, Hash, Serialize, Deserialize))]
pub enum ActionKind {
    RollDice,
    PlaceRoad(EdgeId),
    PlaceSettlement(VertexId),
    UpgradeToCity(VertexId),
    BuyDevelopmentCard,
    PlayDevelopmentCard(DevCardPlay),
    MoveRobber(TileId),
    DrawFromPlayer(PlayerId),
    DiscardResources(ResourceBundle),
    OpenTrade {
        code: TradeCode,
        wish: ResourceBundle,
        offer: ResourceBundle,
    },
    OfferBid {
        code: TradeCode,
        bid: ResourceBundle,
    },
    AcceptBid {
        code: TradeCode,
        bidder: PlayerId,
    },
    CancelTrade {
        code: TradeCode,
    },
    BankTrade {
        give: Resource,
        receive: Resource,
    },
    EndTurn,
}

impl ActionKind {
    pub fn action_type(&self) -> ActionType {
        ActionType::from(self)
    }
}

/// Kind-specific payload of a development card play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevCardPlay {
    Knight { tile: TileId },
    YearOfPlenty(Resource, Resource),
    Monopoly(Resource),
    /// The second road is optional when only one legal spot remains.
    RoadBuilding(EdgeId, Option<EdgeId>),
}

impl DevCardPlay {
    pub fn card(&self) -> DevelopmentCard {
        match self {
            DevCardPlay::Knight { .. } => DevelopmentCard::Knight,
            DevCardPlay::YearOfPlenty(..) => DevelopmentCard::YearOfPlenty,
            DevCardPlay::Monopoly(_) => DevelopmentCard::Monopoly,
            DevCardPlay::RoadBuilding(..) => DevelopmentCard::RoadBuilding,
        }
    }
}
