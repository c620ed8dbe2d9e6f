use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::ai::{Planner, Snapshot};
use crate::board::BoardVariant;
use crate::types::PlayerId;

use super::action::{Action, ActionKind};
use super::error::GameError;
use super::events::GameEvent;
use super::state::{GameState, Phase};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

/// Replanning rounds `play_ai` allows before giving up on a seat.
const MAX_AI_ROUNDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub num_players: usize,
    pub board: BoardVariant,
    pub vps_to_win: u8,
    pub seed: u64,
    /// A seven makes every hand larger than this discard half.
    pub discard_limit: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_players: 4,
            board: BoardVariant::Standard,
            vps_to_win: 10,
            seed: 42,
            discard_limit: 7,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("between {MIN_PLAYERS} and {MAX_PLAYERS} players supported, got {0}")]
    PlayerCount(usize),
    #[error("victory point target must be at least 3, got {0}")]
    VictoryPoints(u8),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.num_players) {
            return Err(ConfigError::PlayerCount(self.num_players));
        }
        if self.vps_to_win < 3 {
            return Err(ConfigError::VictoryPoints(self.vps_to_win));
        }
        Ok(())
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    Human,
    Ai,
}

/// Everything scoped to one session that components need to know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: SessionId,
    pub seats: Vec<Controller>,
}

/// What one `play_ai` call did.
#[derive(Debug, Clone, Default)]
pub struct AiTurn {
    pub applied: Vec<Action>,
    pub rejected: Option<(Action, GameError)>,
    pub events: Vec<GameEvent>,
}

impl AiTurn {
    fn absorb(&mut self, other: AiTurn) {
        self.applied.extend(other.applied);
        self.events.extend(other.events);
        if other.rejected.is_some() {
            self.rejected = other.rejected;
        }
    }
}

/// A running game and its single application boundary.
#[derive(Debug, Clone)]
pub struct GameSession {
    context: SessionContext,
    state: GameState,
    planner: Planner,
    log: Vec<Action>,
    aborted: bool,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        let seats = vec![Controller::Ai; config.num_players];
        Self::with_seats(config, seats)
    }

    pub fn with_seats(config: GameConfig, seats: Vec<Controller>) -> Result<Self, ConfigError> {
        config.validate()?;
        if seats.len() != config.num_players {
            return Err(ConfigError::PlayerCount(seats.len()));
        }
        let context = SessionContext {
            id: SessionId::new(),
            seats,
        };
        debug!(
            session = %context.id,
            players = config.num_players,
            seed = config.seed,
            "session created"
        );
        Ok(Self {
            context,
            state: GameState::new(config),
            planner: Planner::default(),
            log: Vec::new(),
            aborted: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.context.id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn log(&self) -> &[Action] {
        &self.log
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn set_planner(&mut self, planner: Planner) {
        self.planner = planner;
    }

    /// Build an action addressed to this session.
    pub fn action(&self, player: PlayerId, kind: ActionKind) -> Action {
        Action::new(self.context.id, player, kind)
    }

    pub fn queue_dice(&mut self, dice: (u8, u8)) {
        self.state.queue_dice(dice);
    }

    /// Validate and apply one action. A broken invariant stops the session
    /// for good.
    pub fn apply(&mut self, action: Action) -> Result<Vec<GameEvent>, GameError> {
        if self.aborted {
            return Err(GameError::SessionAborted);
        }
        if action.session != self.context.id {
            return Err(GameError::WrongSession(action.session));
        }
        let events = match self.state.apply(action.player, &action.kind) {
            Ok(events) => events,
            Err(err) => {
                debug!(
                    player = action.player,
                    action = %action.kind.action_type(),
                    %err,
                    "action rejected"
                );
                return Err(err);
            }
        };
        if let Err(violation) = self.state.verify_invariants() {
            error!(session = %self.context.id, %violation, "invariant violated, aborting session");
            self.aborted = true;
            return Err(violation);
        }
        self.log.push(action);
        Ok(events)
    }

    /// Seat whose input the game is waiting on, if any.
    pub fn next_actor(&self) -> Option<PlayerId> {
        match self.state.phase() {
            Phase::Concluded => None,
            Phase::RobberDiscard => self.state.pending_discards().keys().next().copied(),
            _ => Some(self.state.current_player()),
        }
    }

    pub fn snapshot_for(&self, player: PlayerId) -> Snapshot {
        Snapshot::capture(&self.state, self.context.id, player)
    }

    /// The actions the planner would take for `player` right now.
    pub fn plan_ai(&self, player: PlayerId) -> Vec<Action> {
        self.planner.plan(&self.snapshot_for(player))
    }

    /// Plan for `player` and replay the plan through [`GameSession::apply`].
    /// Replans after chance events such as a roll. Stops at the first
    /// rejected action and then ends the turn if that is still legal.
    pub fn play_ai(&mut self, player: PlayerId) -> AiTurn {
        let mut turn = AiTurn::default();
        for _ in 0..MAX_AI_ROUNDS {
            let plan = self.plan_ai(player);
            let Some(last) = plan.last().cloned() else {
                break;
            };
            for action in plan {
                match self.apply(action.clone()) {
                    Ok(events) => {
                        turn.events.extend(events);
                        turn.applied.push(action);
                    }
                    Err(err) => {
                        warn!(
                            player,
                            action = %action.kind.action_type(),
                            %err,
                            "planned action rejected"
                        );
                        turn.rejected = Some((action, err));
                        break;
                    }
                }
            }
            if turn.rejected.is_some() {
                self.end_turn_if_legal(player, &mut turn);
                break;
            }
            if !Planner::is_chance_boundary(&last.kind) {
                break;
            }
        }
        turn
    }

    pub fn controller(&self, seat: PlayerId) -> Option<Controller> {
        self.context.seats.get(seat).copied()
    }

    /// One round for the AI seats: the other AI seats answer any open
    /// trade, then the seat the game waits on plays. `None` once the game
    /// is over or aborted, or while a human seat is due.
    pub fn step_ai(&mut self) -> Option<AiTurn> {
        if self.aborted {
            return None;
        }
        let actor = self.next_actor()?;
        if self.controller(actor) != Some(Controller::Ai) {
            return None;
        }
        let mut turn = AiTurn::default();
        if self.state.trades().open_sessions().next().is_some() {
            let bidders = (0..self.state.num_players())
                .filter(|seat| *seat != actor && self.controller(*seat) == Some(Controller::Ai))
                .collect::<Vec<_>>();
            for seat in bidders {
                let answer = self.play_ai(seat);
                turn.absorb(answer);
            }
        }
        let played = self.play_ai(actor);
        turn.absorb(played);
        Some(turn)
    }

    /// Let the AI seats play until someone wins, a human seat is due,
    /// nothing moves, or `max_actions` actions have been applied.
    pub fn play_out(&mut self, max_actions: usize) -> Option<PlayerId> {
        while self.log.len() < max_actions {
            let Some(turn) = self.step_ai() else {
                break;
            };
            if turn.applied.is_empty() {
                warn!(
                    session = %self.context.id,
                    phase = %self.state.phase(),
                    "no seat could move"
                );
                break;
            }
        }
        self.state.winner()
    }

    fn end_turn_if_legal(&mut self, player: PlayerId, turn: &mut AiTurn) {
        let state = &self.state;
        if state.phase() != Phase::NormalPlay
            || state.current_player() != player
            || state.awaiting_roll()
        {
            return;
        }
        let end = self.action(player, ActionKind::EndTurn);
        if let Ok(events) = self.apply(end.clone()) {
            turn.events.extend(events);
            turn.applied.push(end);
        }
    }
}
