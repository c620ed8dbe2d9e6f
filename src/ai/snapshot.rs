use std::collections::BTreeMap;

use crate::board::Board;
use crate::game::inventory::{Inventory, PrivateView, PublicView};
use crate::game::resources::ResourceBundle;
use crate::game::session::SessionId;
use crate::game::setup::SetupPrompt;
use crate::game::state::{GameState, Phase, RobberStep};
use crate::trade::{TradeCode, TradeSession};
use crate::types::{PlayerId, Resource};

/// What one seat is allowed to know. Opponent hands appear only as counts
/// and the deck only as its size.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub session: SessionId,
    pub me: PlayerId,
    pub board: Board,
    pub own: PrivateView,
    pub opponents: BTreeMap<PlayerId, PublicView>,
    pub bank: ResourceBundle,
    pub deck_len: usize,
    pub phase: Phase,
    pub current: PlayerId,
    pub setup_prompt: Option<SetupPrompt>,
    pub awaiting_roll: bool,
    pub card_played_this_turn: bool,
    pub trade_attempted: bool,
    /// Cards this seat still owes after a seven.
    pub discard_due: Option<u8>,
    pub robber_step: Option<RobberStep>,
    pub open_trades: Vec<TradeSession>,
    pub next_trade_code: TradeCode,
    pub bank_ratios: [u8; 5],
    pub vps_to_win: u8,
}

impl Snapshot {
    pub fn capture(state: &GameState, session: SessionId, me: PlayerId) -> Self {
        let own = state
            .inventory(me)
            .map(|inventory| inventory.private_view())
            .unwrap_or_else(|| Inventory::player(me).private_view());
        let opponents = state
            .inventories()
            .iter()
            .enumerate()
            .filter(|(player, _)| *player != me)
            .map(|(player, inventory)| (player, inventory.public_view()))
            .collect();

        Self {
            session,
            me,
            board: state.board().clone(),
            own,
            opponents,
            bank: *state.bank().resources(),
            deck_len: state.deck_len(),
            phase: state.phase(),
            current: state.current_player(),
            setup_prompt: state.setup_prompt(),
            awaiting_roll: state.awaiting_roll(),
            card_played_this_turn: state.card_played_this_turn(),
            trade_attempted: state.trade_attempted(),
            discard_due: state.pending_discards().get(&me).copied(),
            robber_step: state.robber_step().cloned(),
            open_trades: state.trades().open_sessions().cloned().collect(),
            next_trade_code: state.trades().next_code(),
            bank_ratios: Resource::ALL.map(|resource| state.bank_ratio(me, resource)),
            vps_to_win: state.config().vps_to_win,
        }
    }

    pub fn is_my_turn(&self) -> bool {
        self.current == self.me
    }

    pub fn hand(&self) -> &ResourceBundle {
        &self.own.resources
    }

    pub fn public_points_of(&self, player: PlayerId) -> u8 {
        if player == self.me {
            self.own.victory_points - self.own.victory_point_cards
        } else {
            self.opponents
                .get(&player)
                .map(|view| view.public_points)
                .unwrap_or(0)
        }
    }

    pub fn hand_size_of(&self, player: PlayerId) -> u32 {
        if player == self.me {
            self.own.resources.total()
        } else {
            self.opponents
                .get(&player)
                .map(|view| view.resource_count)
                .unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::{GameConfig, GameSession};

    #[test]
    fn snapshot_hides_opponent_hands() {
        let session = GameSession::new(GameConfig {
            num_players: 3,
            ..GameConfig::default()
        })
        .unwrap();
        let snapshot = session.snapshot_for(1);
        assert_eq!(snapshot.me, 1);
        assert_eq!(snapshot.opponents.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(snapshot.phase, Phase::StartingPlacement);
        assert_eq!(snapshot.setup_prompt, Some(SetupPrompt::Settlement));
        assert_eq!(snapshot.deck_len, 25);
        assert_eq!(snapshot.bank.total(), 95);
        assert_eq!(snapshot.bank_ratios, [4; 5]);
    }
}
