use std::collections::{BTreeMap, VecDeque};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};

use crate::board::{Board, EdgeId, OwnershipChange, TileId, VertexId};
use crate::board::{HolderChange, LongestRoadCalculator};
use crate::trade::{self, TradeBook, TradeCode, TradeStatus};
use crate::types::{Achievement, BuildingLevel, DevelopmentCard, PlayerId, Resource};

use super::action::{ActionKind, DevCardPlay};
use super::deck::DevelopmentDeck;
use super::error::GameError;
use super::events::GameEvent;
use super::inventory::{BANK_RESOURCES_PER_KIND, Inventory, MAX_ROADS, Piece};
use super::resources::{COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceBundle};
use super::session::GameConfig;
use super::setup::{SetupPrompt, SetupState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Phase {
    StartingPlacement,
    NormalPlay,
    RobberDiscard,
    RobberMove,
    Concluded,
}

/// Sub-state of `Phase::RobberMove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobberStep {
    MoveTile,
    /// The robber has moved; the mover must pick one of these victims.
    Draw { candidates: Vec<PlayerId> },
}

/// Authoritative state of one game. Every mutation goes through [`GameState::apply`].
#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    board: Board,
    inventories: Vec<Inventory>,
    bank: Inventory,
    deck: DevelopmentDeck,
    phase: Phase,
    setup: SetupState,
    current: PlayerId,
    turn: u32,
    dice: Option<(u8, u8)>,
    queued_dice: VecDeque<(u8, u8)>,
    awaiting_roll: bool,
    card_played_this_turn: bool,
    trade_attempted: bool,
    discards: BTreeMap<PlayerId, u8>,
    robber_step: RobberStep,
    roads: LongestRoadCalculator,
    largest_army: Option<PlayerId>,
    trades: TradeBook,
    winner: Option<PlayerId>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let board = Board::generate_with_rng(config.board, &mut rng);
        let deck = DevelopmentDeck::shuffled(&mut rng);
        let inventories = (0..config.num_players).map(Inventory::player).collect();
        let setup = SetupState::new(config.num_players);
        let current = setup.current_player().unwrap_or(0);

        Self {
            roads: LongestRoadCalculator::new(config.num_players),
            config,
            board,
            inventories,
            bank: Inventory::bank(),
            deck,
            phase: Phase::StartingPlacement,
            setup,
            current,
            turn: 0,
            dice: None,
            queued_dice: VecDeque::new(),
            awaiting_roll: false,
            card_played_this_turn: false,
            trade_attempted: false,
            discards: BTreeMap::new(),
            robber_step: RobberStep::MoveTile,
            largest_army: None,
            trades: TradeBook::new(),
            winner: None,
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn inventory(&self, player: PlayerId) -> Option<&Inventory> {
        self.inventories.get(player)
    }

    pub fn inventories(&self) -> &[Inventory] {
        &self.inventories
    }

    pub fn bank(&self) -> &Inventory {
        &self.bank
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn num_players(&self) -> usize {
        self.inventories.len()
    }

    /// Seat expected to act next. During a discard this is the turn owner;
    /// see [`GameState::pending_discards`] for who owes cards.
    pub fn current_player(&self) -> PlayerId {
        self.current
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn dice(&self) -> Option<(u8, u8)> {
        self.dice
    }

    pub fn awaiting_roll(&self) -> bool {
        self.awaiting_roll
    }

    pub fn card_played_this_turn(&self) -> bool {
        self.card_played_this_turn
    }

    pub fn trade_attempted(&self) -> bool {
        self.trade_attempted
    }

    pub fn setup_prompt(&self) -> Option<SetupPrompt> {
        match self.phase {
            Phase::StartingPlacement => self.setup.current_prompt(),
            _ => None,
        }
    }

    pub fn pending_discards(&self) -> &BTreeMap<PlayerId, u8> {
        &self.discards
    }

    pub fn robber_step(&self) -> Option<&RobberStep> {
        (self.phase == Phase::RobberMove).then_some(&self.robber_step)
    }

    pub fn trades(&self) -> &TradeBook {
        &self.trades
    }

    pub fn longest_road_holder(&self) -> Option<PlayerId> {
        self.roads.holder()
    }

    pub fn largest_army_holder(&self) -> Option<PlayerId> {
        self.largest_army
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn scores(&self) -> Vec<u8> {
        self.inventories
            .iter()
            .map(Inventory::victory_points)
            .collect()
    }

    /// Dice for upcoming rolls, used before the seeded generator. Lets a
    /// recorded game be replayed exactly.
    pub fn queue_dice(&mut self, dice: (u8, u8)) {
        self.queued_dice.push_back(dice);
    }

    /// Apply one action for `player`. On error nothing changed, except that a
    /// trade settlement voids the offending bid.
    pub fn apply(
        &mut self,
        player: PlayerId,
        kind: &ActionKind,
    ) -> Result<Vec<GameEvent>, GameError> {
        if player >= self.inventories.len() {
            return Err(GameError::UnknownPlayer(player));
        }
        self.ensure_allowed(kind)?;
        self.ensure_actor(player, kind)?;

        let before = self.inventories.clone();
        let mut events = Vec::new();
        match kind {
            ActionKind::PlaceSettlement(vertex) if self.phase == Phase::StartingPlacement => {
                self.place_starting_settlement(player, *vertex, &mut events)?
            }
            ActionKind::PlaceRoad(edge) if self.phase == Phase::StartingPlacement => {
                self.place_starting_road(player, *edge, &mut events)?
            }
            ActionKind::RollDice => self.roll_dice(player, &mut events)?,
            ActionKind::PlaceRoad(edge) => self.build_road(player, *edge, &mut events)?,
            ActionKind::PlaceSettlement(vertex) => {
                self.build_settlement(player, *vertex, &mut events)?
            }
            ActionKind::UpgradeToCity(vertex) => self.build_city(player, *vertex, &mut events)?,
            ActionKind::BuyDevelopmentCard => self.buy_development_card(player, &mut events)?,
            ActionKind::PlayDevelopmentCard(play) => {
                self.play_development_card(player, *play, &mut events)?
            }
            ActionKind::MoveRobber(tile) => self.move_robber(player, *tile, &mut events)?,
            ActionKind::DrawFromPlayer(target) => {
                self.draw_from_player(player, *target, &mut events)?
            }
            ActionKind::DiscardResources(bundle) => self.discard(player, *bundle, &mut events)?,
            ActionKind::OpenTrade { code, wish, offer } => {
                self.open_trade(player, *code, *wish, *offer, &mut events)?
            }
            ActionKind::OfferBid { code, bid } => {
                self.trades.bid(*code, player, *bid)?;
                events.push(GameEvent::BidReceived {
                    code: *code,
                    bidder: player,
                });
            }
            ActionKind::AcceptBid { code, bidder } => {
                self.accept_bid(player, *code, *bidder, &mut events)?
            }
            ActionKind::CancelTrade { code } => {
                self.trades.cancel(*code, player)?;
                events.push(GameEvent::TradeStateChanged {
                    code: *code,
                    status: TradeStatus::Cancelled,
                });
            }
            ActionKind::BankTrade { give, receive } => {
                self.bank_trade(player, *give, *receive, &mut events)?
            }
            ActionKind::EndTurn => self.end_turn(player, &mut events),
        }

        debug!(player, action = %kind.action_type(), phase = %self.phase, "action applied");
        self.push_inventory_changes(&before, &mut events);
        self.check_victory(&mut events);
        Ok(events)
    }

    fn illegal(&self, kind: &ActionKind) -> GameError {
        GameError::IllegalPhaseTransition {
            phase: self.phase,
            action: kind.action_type(),
        }
    }

    fn ensure_allowed(&self, kind: &ActionKind) -> Result<(), GameError> {
        let allowed = match self.phase {
            Phase::StartingPlacement => matches!(
                (kind, self.setup.current_prompt()),
                (ActionKind::PlaceSettlement(_), Some(SetupPrompt::Settlement))
                    | (ActionKind::PlaceRoad(_), Some(SetupPrompt::Road))
            ),
            Phase::NormalPlay => match kind {
                ActionKind::MoveRobber(_)
                | ActionKind::DrawFromPlayer(_)
                | ActionKind::DiscardResources(_) => false,
                ActionKind::RollDice => self.awaiting_roll,
                ActionKind::PlayDevelopmentCard(_)
                | ActionKind::OfferBid { .. }
                | ActionKind::CancelTrade { .. } => true,
                _ => !self.awaiting_roll,
            },
            Phase::RobberDiscard => matches!(
                kind,
                ActionKind::DiscardResources(_) | ActionKind::CancelTrade { .. }
            ),
            Phase::RobberMove => matches!(
                (kind, &self.robber_step),
                (ActionKind::MoveRobber(_), RobberStep::MoveTile)
                    | (ActionKind::DrawFromPlayer(_), RobberStep::Draw { .. })
                    | (ActionKind::CancelTrade { .. }, _)
            ),
            Phase::Concluded => false,
        };
        if allowed { Ok(()) } else { Err(self.illegal(kind)) }
    }

    fn ensure_actor(&self, player: PlayerId, kind: &ActionKind) -> Result<(), GameError> {
        let expected = match (self.phase, kind) {
            // Bidding is open to everyone; seller rules live in the trade book.
            (_, ActionKind::OfferBid { .. } | ActionKind::CancelTrade { .. }) => return Ok(()),
            (Phase::RobberDiscard, ActionKind::DiscardResources(_)) => {
                return if self.discards.contains_key(&player) {
                    Ok(())
                } else {
                    Err(GameError::NotYourTurn(player))
                };
            }
            (Phase::StartingPlacement, _) => self.setup.current_player(),
            _ => Some(self.current),
        };
        if expected == Some(player) {
            Ok(())
        } else {
            Err(GameError::NotYourTurn(player))
        }
    }

    fn set_phase(&mut self, phase: Phase, events: &mut Vec<GameEvent>) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, player = self.current, "phase changed");
            self.phase = phase;
            events.push(GameEvent::PhaseChanged { phase });
        }
    }

    // Starting placement

    fn place_starting_settlement(
        &mut self,
        player: PlayerId,
        vertex: VertexId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.validate_settlement(vertex, player, true)?;
        if !self.inventories[player].has_piece(Piece::Settlement) {
            return Err(GameError::OutOfStock(Piece::Settlement));
        }

        let change = self.board.place_settlement(vertex, player, true)?;
        self.inventories[player].use_piece(Piece::Settlement)?;
        let points = BuildingLevel::Settlement.victory_points() as i8;
        self.inventories[player].adjust_building_points(points);
        events.push(GameEvent::BuildingPlaced {
            player,
            vertex,
            level: BuildingLevel::Settlement,
        });
        self.record_ownership(change, events);

        if self.setup.is_second_round() {
            self.grant_starting_resources(player, vertex, events);
        }
        self.setup.advance();
        Ok(())
    }

    fn grant_starting_resources(
        &mut self,
        player: PlayerId,
        vertex: VertexId,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(spot) = self.board.vertex(vertex) else {
            return;
        };
        let mut bundle = ResourceBundle::zero();
        for tile in &spot.tiles {
            if let Some(resource) = self.board.tiles()[*tile as usize].terrain.resource() {
                if self.bank.resource(resource) > bundle.get(resource) {
                    bundle.add(resource, 1);
                }
            }
        }
        if bundle.is_empty() {
            return;
        }
        if self.bank.decrease_bundle(&bundle).is_ok() {
            self.inventories[player].increase_bundle(&bundle);
            events.push(GameEvent::ResourcesProduced { player, bundle });
        }
    }

    fn place_starting_road(
        &mut self,
        player: PlayerId,
        edge: EdgeId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.validate_road(edge, player, true)?;
        if !self.inventories[player].has_piece(Piece::Road) {
            return Err(GameError::OutOfStock(Piece::Road));
        }

        let change = self.board.place_road(edge, player, true)?;
        self.inventories[player].use_piece(Piece::Road)?;
        events.push(GameEvent::RoadBuilt { player, edge });
        self.record_ownership(change, events);

        self.setup.advance();
        match self.setup.current_player() {
            Some(next) => self.current = next,
            None => {
                self.current = 0;
                self.awaiting_roll = true;
                self.set_phase(Phase::NormalPlay, events);
                events.push(GameEvent::TurnAdvanced {
                    player: 0,
                    turn: self.turn,
                });
            }
        }
        Ok(())
    }

    // Dice, production and the robber

    fn roll_dice(
        &mut self,
        player: PlayerId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let (d1, d2) = match self.queued_dice.pop_front() {
            Some((a, b)) => (a.clamp(1, 6), b.clamp(1, 6)),
            None => (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6)),
        };
        self.dice = Some((d1, d2));
        self.awaiting_roll = false;
        events.push(GameEvent::DiceRolled {
            player,
            dice: (d1, d2),
        });
        debug!(player, d1, d2, "dice rolled");

        let sum = d1 + d2;
        if sum == 7 {
            self.begin_robber(events);
        } else {
            self.produce(sum, events);
        }
        Ok(())
    }

    /// Pay every building on a tile matching `roll`. A resource the bank
    /// cannot cover for every claimant is paid to no one.
    fn produce(&mut self, roll: u8, events: &mut Vec<GameEvent>) {
        let mut claims: BTreeMap<Resource, BTreeMap<PlayerId, u8>> = BTreeMap::new();
        for tile in self.board.producing_tiles(roll) {
            let Some(resource) = tile.terrain.resource() else {
                continue;
            };
            for vertex in tile.vertices {
                if let Some(building) = self.board.vertices()[vertex as usize].building {
                    *claims
                        .entry(resource)
                        .or_default()
                        .entry(building.owner)
                        .or_default() += building.level.yield_multiplier();
                }
            }
        }

        let mut payouts: BTreeMap<PlayerId, ResourceBundle> = BTreeMap::new();
        for (resource, owed) in claims {
            let total: u32 = owed.values().map(|&amount| amount as u32).sum();
            if total > self.bank.resource(resource) as u32 {
                debug!(?resource, total, "bank short, production withheld");
                events.push(GameEvent::ProductionWithheld { resource });
                continue;
            }
            for (player, amount) in owed {
                payouts.entry(player).or_default().add(resource, amount);
            }
        }
        for (player, bundle) in payouts {
            if self.bank.decrease_bundle(&bundle).is_ok() {
                self.inventories[player].increase_bundle(&bundle);
                events.push(GameEvent::ResourcesProduced { player, bundle });
            }
        }
    }

    fn begin_robber(&mut self, events: &mut Vec<GameEvent>) {
        self.discards = self
            .inventories
            .iter()
            .enumerate()
            .filter_map(|(player, inventory)| {
                let held = inventory.resource_count();
                (held > self.config.discard_limit as u32).then_some((player, (held / 2) as u8))
            })
            .collect();
        if self.discards.is_empty() {
            self.robber_step = RobberStep::MoveTile;
            self.set_phase(Phase::RobberMove, events);
            return;
        }
        for (player, count) in &self.discards {
            events.push(GameEvent::DiscardRequired {
                player: *player,
                count: *count,
            });
        }
        self.set_phase(Phase::RobberDiscard, events);
    }

    fn discard(
        &mut self,
        player: PlayerId,
        bundle: ResourceBundle,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let required = self.discards.get(&player).copied().unwrap_or(0);
        if bundle.total() != required as u32 {
            return Err(GameError::InvalidPayload("discard must match the required count"));
        }
        self.inventories[player].decrease_bundle(&bundle)?;
        self.bank.increase_bundle(&bundle);
        self.discards.remove(&player);
        events.push(GameEvent::Discarded { player, bundle });

        if self.discards.is_empty() {
            self.robber_step = RobberStep::MoveTile;
            self.set_phase(Phase::RobberMove, events);
        }
        Ok(())
    }

    fn move_robber(
        &mut self,
        player: PlayerId,
        tile: TileId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.move_robber(tile)?;
        events.push(GameEvent::RobberMoved { player, tile });
        self.after_robber_moved(player, tile, events);
        Ok(())
    }

    fn after_robber_moved(&mut self, player: PlayerId, tile: TileId, events: &mut Vec<GameEvent>) {
        let candidates = self.draw_candidates(player, tile);
        if candidates.is_empty() {
            self.robber_step = RobberStep::MoveTile;
            self.set_phase(Phase::NormalPlay, events);
        } else {
            self.robber_step = RobberStep::Draw { candidates };
            self.set_phase(Phase::RobberMove, events);
        }
    }

    /// Opponents with a building on `tile` and at least one resource card.
    pub fn draw_candidates(&self, player: PlayerId, tile: TileId) -> Vec<PlayerId> {
        self.board
            .owners_on_tile(tile)
            .into_iter()
            .filter(|owner| *owner != player && self.inventories[*owner].resource_count() > 0)
            .collect()
    }

    fn draw_from_player(
        &mut self,
        player: PlayerId,
        target: PlayerId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let RobberStep::Draw { candidates } = &self.robber_step else {
            return Err(GameError::InvalidPayload("no draw pending"));
        };
        if !candidates.contains(&target) {
            return Err(GameError::InvalidPayload("target has no building on the robber tile"));
        }

        let bag: Vec<Resource> = self.inventories[target]
            .resources()
            .iter()
            .flat_map(|(resource, amount)| std::iter::repeat_n(resource, amount as usize))
            .collect();
        let drawn = if bag.is_empty() {
            None
        } else {
            Some(bag[self.rng.gen_range(0..bag.len())])
        };
        if let Some(resource) = drawn {
            self.inventories[target].decrease(resource, 1)?;
            self.inventories[player].increase(resource, 1);
        }
        events.push(GameEvent::ResourceDrawn {
            thief: player,
            victim: target,
            resource: drawn,
        });
        self.robber_step = RobberStep::MoveTile;
        self.set_phase(Phase::NormalPlay, events);
        Ok(())
    }

    // Construction

    fn pay(&mut self, player: PlayerId, cost: &ResourceBundle) -> Result<(), GameError> {
        self.inventories[player].decrease_bundle(cost)?;
        self.bank.increase_bundle(cost);
        Ok(())
    }

    fn ensure_can_build(
        &self,
        player: PlayerId,
        piece: Piece,
        cost: &ResourceBundle,
    ) -> Result<(), GameError> {
        let inventory = &self.inventories[player];
        if !inventory.has_piece(piece) {
            return Err(GameError::OutOfStock(piece));
        }
        if !inventory.can_afford(cost) {
            return Err(GameError::InsufficientResources);
        }
        Ok(())
    }

    fn build_road(
        &mut self,
        player: PlayerId,
        edge: EdgeId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.validate_road(edge, player, false)?;
        self.ensure_can_build(player, Piece::Road, &COST_ROAD)?;

        self.pay(player, &COST_ROAD)?;
        self.lay_road(player, edge, events)
    }

    fn lay_road(
        &mut self,
        player: PlayerId,
        edge: EdgeId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let change = self.board.place_road(edge, player, false)?;
        self.inventories[player].use_piece(Piece::Road)?;
        events.push(GameEvent::RoadBuilt { player, edge });
        self.record_ownership(change, events);
        Ok(())
    }

    fn build_settlement(
        &mut self,
        player: PlayerId,
        vertex: VertexId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.validate_settlement(vertex, player, false)?;
        self.ensure_can_build(player, Piece::Settlement, &COST_SETTLEMENT)?;

        self.pay(player, &COST_SETTLEMENT)?;
        let change = self.board.place_settlement(vertex, player, false)?;
        self.inventories[player].use_piece(Piece::Settlement)?;
        let points = BuildingLevel::Settlement.victory_points() as i8;
        self.inventories[player].adjust_building_points(points);
        events.push(GameEvent::BuildingPlaced {
            player,
            vertex,
            level: BuildingLevel::Settlement,
        });
        self.record_ownership(change, events);
        Ok(())
    }

    fn build_city(
        &mut self,
        player: PlayerId,
        vertex: VertexId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.board.validate_city(vertex, player)?;
        self.ensure_can_build(player, Piece::City, &COST_CITY)?;

        self.pay(player, &COST_CITY)?;
        let change = self.board.upgrade_to_city(vertex, player)?;
        self.inventories[player].use_piece(Piece::City)?;
        let gained =
            BuildingLevel::City.victory_points() - BuildingLevel::Settlement.victory_points();
        self.inventories[player].adjust_building_points(gained as i8);
        events.push(GameEvent::BuildingPlaced {
            player,
            vertex,
            level: BuildingLevel::City,
        });
        self.record_ownership(change, events);
        Ok(())
    }

    /// Feed a board change to the longest road calculator and mirror the
    /// result into inventories.
    fn record_ownership(&mut self, change: OwnershipChange, events: &mut Vec<GameEvent>) {
        let holder_change = self.roads.on_ownership_change(&self.board, change);
        for (player, inventory) in self.inventories.iter_mut().enumerate() {
            inventory.set_longest_road_length(self.roads.length_of(player));
        }
        if let Some(HolderChange { previous, holder }) = holder_change {
            self.move_flag(Achievement::LongestRoad, previous, holder, events);
        }
    }

    fn move_flag(
        &mut self,
        flag: Achievement,
        previous: Option<PlayerId>,
        holder: Option<PlayerId>,
        events: &mut Vec<GameEvent>,
    ) {
        if let Some(previous) = previous {
            self.inventories[previous].set_achievement(flag, false);
        }
        if let Some(holder) = holder {
            self.inventories[holder].set_achievement(flag, true);
        }
        info!(%flag, ?previous, ?holder, "achievement changed");
        events.push(GameEvent::AchievementChanged { flag, holder });
    }

    // Development cards

    fn buy_development_card(
        &mut self,
        player: PlayerId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        if self.deck.is_empty() {
            return Err(GameError::DeckExhausted);
        }
        if !self.inventories[player].can_afford(&COST_DEVELOPMENT) {
            return Err(GameError::InsufficientResources);
        }
        self.pay(player, &COST_DEVELOPMENT)?;
        let card = self.deck.draw().ok_or(GameError::DeckExhausted)?;
        self.inventories[player].add_development_card(card);
        events.push(GameEvent::DevelopmentCardBought { player });
        Ok(())
    }

    fn play_development_card(
        &mut self,
        player: PlayerId,
        play: DevCardPlay,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let card = play.card();
        if self.card_played_this_turn || self.inventories[player].playable_count(card) == 0 {
            return Err(GameError::DevelopmentCardUnavailable(card));
        }

        match play {
            DevCardPlay::Knight { tile } => {
                self.board.validate_robber_move(tile)?;
                self.spend_card(player, card, events)?;
                self.inventories[player].record_knight();
                self.update_largest_army(player, events);
                self.board.move_robber(tile)?;
                events.push(GameEvent::RobberMoved { player, tile });
                self.after_robber_moved(player, tile, events);
            }
            DevCardPlay::YearOfPlenty(first, second) => {
                let mut bundle = ResourceBundle::single(first, 1);
                bundle.add(second, 1);
                if !self.bank.can_afford(&bundle) {
                    return Err(GameError::BankExhausted);
                }
                self.spend_card(player, card, events)?;
                self.bank.decrease_bundle(&bundle)?;
                self.inventories[player].increase_bundle(&bundle);
            }
            DevCardPlay::Monopoly(resource) => {
                self.spend_card(player, card, events)?;
                let mut taken = 0u8;
                for (other, inventory) in self.inventories.iter_mut().enumerate() {
                    if other == player {
                        continue;
                    }
                    let amount = inventory.resource(resource);
                    if amount > 0 {
                        inventory.decrease(resource, amount)?;
                        taken = taken.saturating_add(amount);
                    }
                }
                self.inventories[player].increase(resource, taken);
            }
            DevCardPlay::RoadBuilding(first, second) => {
                let needed = if second.is_some() { 2 } else { 1 };
                if self.inventories[player].stock().roads < needed {
                    return Err(GameError::OutOfStock(Piece::Road));
                }
                self.board.validate_road(first, player, false)?;
                if let Some(second) = second {
                    let mut preview = self.board.clone();
                    preview.place_road(first, player, false)?;
                    preview.validate_road(second, player, false)?;
                }
                self.spend_card(player, card, events)?;
                self.lay_road(player, first, events)?;
                if let Some(second) = second {
                    self.lay_road(player, second, events)?;
                }
            }
        }
        Ok(())
    }

    fn spend_card(
        &mut self,
        player: PlayerId,
        card: DevelopmentCard,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.inventories[player].take_playable(card)?;
        self.card_played_this_turn = true;
        events.push(GameEvent::DevelopmentCardPlayed { player, card });
        Ok(())
    }

    fn update_largest_army(&mut self, player: PlayerId, events: &mut Vec<GameEvent>) {
        if self.largest_army == Some(player) {
            return;
        }
        let knights = self.inventories[player].knights_played();
        let floor = match self.largest_army {
            Some(holder) => self.inventories[holder].knights_played() + 1,
            None => Achievement::LargestArmy.threshold(),
        };
        if knights >= floor {
            let previous = self.largest_army.replace(player);
            self.move_flag(Achievement::LargestArmy, previous, Some(player), events);
        }
    }

    // Trading

    fn open_trade(
        &mut self,
        player: PlayerId,
        code: TradeCode,
        wish: ResourceBundle,
        offer: ResourceBundle,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.trades.validate_open(code, &wish, &offer)?;
        if !self.inventories[player].can_afford(&offer) {
            return Err(GameError::InsufficientResources);
        }
        self.trades.open(code, player, wish, offer)?;
        self.trade_attempted = true;
        events.push(GameEvent::TradeStateChanged {
            code,
            status: TradeStatus::Open,
        });
        Ok(())
    }

    fn accept_bid(
        &mut self,
        player: PlayerId,
        code: TradeCode,
        bidder: PlayerId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        self.trades.begin_decision(code, player, bidder)?;
        let settlement = self.trades.settle(code, bidder, &mut self.inventories)?;
        debug!(code, seller = settlement.seller, bidder, "bid accepted");
        events.push(GameEvent::TradeStateChanged {
            code,
            status: TradeStatus::Settled,
        });
        Ok(())
    }

    fn bank_trade(
        &mut self,
        player: PlayerId,
        give: Resource,
        receive: Resource,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        if give == receive {
            return Err(GameError::InvalidPayload("bank trade needs two different kinds"));
        }
        let ratio = self.bank_ratio(player, give);
        let paid = ResourceBundle::single(give, ratio);
        if !self.inventories[player].can_afford(&paid) {
            return Err(GameError::InsufficientResources);
        }
        if self.bank.resource(receive) == 0 {
            return Err(GameError::BankExhausted);
        }
        self.pay(player, &paid)?;
        self.bank.decrease(receive, 1)?;
        self.inventories[player].increase(receive, 1);
        self.trade_attempted = true;
        events.push(GameEvent::BankTraded {
            player,
            give: paid,
            receive,
        });
        Ok(())
    }

    pub fn bank_ratio(&self, player: PlayerId, give: Resource) -> u8 {
        trade::bank_ratio(&self.board.harbors_of(player), give)
    }

    // Turn flow

    fn end_turn(&mut self, player: PlayerId, events: &mut Vec<GameEvent>) {
        for code in self.trades.cancel_all_of(player) {
            events.push(GameEvent::TradeStateChanged {
                code,
                status: TradeStatus::Cancelled,
            });
        }
        self.inventories[player].mature_development_cards();

        self.current = (player + 1) % self.inventories.len();
        self.turn += 1;
        self.dice = None;
        self.awaiting_roll = true;
        self.card_played_this_turn = false;
        self.trade_attempted = false;
        debug!(player = self.current, turn = self.turn, "turn advanced");
        events.push(GameEvent::TurnAdvanced {
            player: self.current,
            turn: self.turn,
        });
    }

    fn push_inventory_changes(&self, before: &[Inventory], events: &mut Vec<GameEvent>) {
        for (player, (old, new)) in before.iter().zip(self.inventories.iter()).enumerate() {
            if old != new {
                events.push(GameEvent::InventoryChanged {
                    player,
                    private: Box::new(new.private_view()),
                    public: new.public_view(),
                });
            }
        }
    }

    /// Current player first, then seat order.
    fn check_victory(&mut self, events: &mut Vec<GameEvent>) {
        if self.phase == Phase::Concluded || self.phase == Phase::StartingPlacement {
            return;
        }
        let seats = self.inventories.len();
        let winner = (0..seats)
            .map(|offset| (self.current + offset) % seats)
            .find(|player| self.inventories[*player].victory_points() >= self.config.vps_to_win);
        if let Some(winner) = winner {
            self.winner = Some(winner);
            self.set_phase(Phase::Concluded, events);
            let scores = self.scores();
            info!(winner, ?scores, turn = self.turn, "game concluded");
            events.push(GameEvent::GameConcluded { winner, scores });
        }
    }

    #[cfg(test)]
    pub(crate) fn inventory_mut(&mut self, player: PlayerId) -> &mut Inventory {
        &mut self.inventories[player]
    }

    /// Cross-check redundant bookkeeping. Any failure is a bug in the engine.
    pub fn verify_invariants(&self) -> Result<(), GameError> {
        for resource in Resource::ALL {
            let held: u32 = self
                .inventories
                .iter()
                .map(|inventory| inventory.resource(resource) as u32)
                .sum::<u32>()
                + self.bank.resource(resource) as u32;
            if held != BANK_RESOURCES_PER_KIND as u32 {
                return Err(GameError::InvariantViolation(format!(
                    "{resource} total is {held}, expected {BANK_RESOURCES_PER_KIND}"
                )));
            }
        }

        for flag in [Achievement::LongestRoad, Achievement::LargestArmy] {
            let holders: Vec<PlayerId> = (0..self.inventories.len())
                .filter(|player| self.inventories[*player].has_achievement(flag))
                .collect();
            let expected = match flag {
                Achievement::LongestRoad => self.roads.holder(),
                Achievement::LargestArmy => self.largest_army,
            };
            if holders.len() > 1 || holders.first().copied() != expected {
                return Err(GameError::InvariantViolation(format!(
                    "{flag} held by {holders:?}, expected {expected:?}"
                )));
            }
        }

        let robbed: Vec<TileId> = self
            .board
            .tiles()
            .iter()
            .filter(|tile| tile.robber)
            .map(|tile| tile.id)
            .collect();
        if robbed != [self.board.robber_tile()] {
            return Err(GameError::InvariantViolation(format!(
                "robber on tiles {robbed:?}"
            )));
        }

        for (player, inventory) in self.inventories.iter().enumerate() {
            let placed = self.board.roads_of(player).count() as u8;
            if placed + inventory.stock().roads != MAX_ROADS {
                return Err(GameError::InvariantViolation(format!(
                    "player {player} has {placed} roads on board but {} in stock",
                    inventory.stock().roads
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardVariant;
    use crate::types::Harbor;

    fn config(players: usize) -> GameConfig {
        GameConfig {
            num_players: players,
            board: BoardVariant::Standard,
            ..GameConfig::default()
        }
    }

    /// Runs starting placement greedily: lowest legal vertex, then lowest
    /// legal road touching it.
    fn finish_setup(state: &mut GameState) {
        while state.phase() == Phase::StartingPlacement {
            let player = state.current_player();
            let vertex = state.board().legal_settlement_spots(player, true)[0];
            state.apply(player, &ActionKind::PlaceSettlement(vertex)).unwrap();
            let edge = state.board().legal_road_spots(player, true)[0];
            state.apply(player, &ActionKind::PlaceRoad(edge)).unwrap();
        }
    }

    fn give(state: &mut GameState, player: PlayerId, bundle: ResourceBundle) {
        state.bank.decrease_bundle(&bundle).unwrap();
        state.inventories[player].increase_bundle(&bundle);
    }

    /// Return `player`'s hand to the bank and deal them exactly `counts`.
    fn set_hand(state: &mut GameState, player: PlayerId, counts: [u8; 5]) {
        let held = *state.inventories[player].resources();
        state.inventories[player].decrease_bundle(&held).unwrap();
        state.bank.increase_bundle(&held);
        give(state, player, ResourceBundle::from_counts(counts));
    }

    #[test]
    fn city_upgrade_pays_the_bank() {
        let mut state = GameState::new(config(4));
        finish_setup(&mut state);
        state.queue_dice((1, 1));
        state.apply(0, &ActionKind::RollDice).unwrap();
        set_hand(&mut state, 0, [0, 0, 0, 2, 3]);
        let bank_before = *state.bank().resources();
        let vertex = state.board().buildings_of(0).next().unwrap().0.id;

        let events = state.apply(0, &ActionKind::UpgradeToCity(vertex)).unwrap();
        assert!(events.contains(&GameEvent::BuildingPlaced {
            player: 0,
            vertex,
            level: BuildingLevel::City,
        }));
        let inventory = state.inventory(0).unwrap();
        assert_eq!(inventory.resource(Resource::Ore), 0);
        assert_eq!(inventory.resource(Resource::Wheat), 0);
        assert_eq!(state.bank().resource(Resource::Ore), bank_before.get(Resource::Ore) + 3);
        assert_eq!(state.bank().resource(Resource::Wheat), bank_before.get(Resource::Wheat) + 2);
        assert_eq!(inventory.public_points(), 3);
        assert_eq!(inventory.stock().cities, 3);

        // The same vertex cannot be upgraded twice.
        set_hand(&mut state, 0, [0, 0, 0, 2, 3]);
        assert!(matches!(
            state.apply(0, &ActionKind::UpgradeToCity(vertex)),
            Err(GameError::InvalidPlacement(_))
        ));
        state.verify_invariants().unwrap();
    }

    #[test]
    fn seven_makes_an_eight_card_hand_discard_four() {
        let mut state = GameState::new(config(3));
        finish_setup(&mut state);
        set_hand(&mut state, 0, [0, 0, 0, 0, 0]);
        set_hand(&mut state, 1, [3, 2, 1, 1, 1]);
        set_hand(&mut state, 2, [1, 1, 1, 1, 3]);
        state.queue_dice((6, 1));

        let events = state.apply(0, &ActionKind::RollDice).unwrap();
        let required: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, GameEvent::DiscardRequired { .. }))
            .collect();
        assert_eq!(required, vec![&GameEvent::DiscardRequired { player: 1, count: 4 }]);
        assert_eq!(state.phase(), Phase::RobberDiscard);
        assert_eq!(state.pending_discards().len(), 1);

        assert_eq!(
            state.apply(2, &ActionKind::DiscardResources(ResourceBundle::single(Resource::Ore, 1))),
            Err(GameError::NotYourTurn(2))
        );
        let short = ResourceBundle::single(Resource::Wood, 3);
        assert!(matches!(
            state.apply(1, &ActionKind::DiscardResources(short)),
            Err(GameError::InvalidPayload(_))
        ));
        assert!(matches!(
            state.apply(1, &ActionKind::DiscardResources(ResourceBundle::single(Resource::Ore, 4))),
            Err(GameError::InsufficientResources)
        ));
        state
            .apply(1, &ActionKind::DiscardResources(ResourceBundle::from_counts([3, 1, 0, 0, 0])))
            .unwrap();
        assert_eq!(state.inventory(1).unwrap().resource_count(), 4);
        assert_eq!(state.phase(), Phase::RobberMove);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn setup_snakes_then_player_zero_rolls() {
        let mut state = GameState::new(config(3));
        finish_setup(&mut state);
        assert_eq!(state.phase(), Phase::NormalPlay);
        assert_eq!(state.current_player(), 0);
        assert!(state.awaiting_roll());
        for player in 0..3 {
            assert_eq!(state.board().buildings_of(player).count(), 2);
            assert_eq!(state.inventory(player).unwrap().stock().roads, 13);
            assert_eq!(state.inventory(player).unwrap().public_points(), 2);
        }
        state.verify_invariants().unwrap();
    }

    #[test]
    fn actions_before_roll_are_rejected() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        let err = state.apply(0, &ActionKind::EndTurn).unwrap_err();
        assert!(matches!(err, GameError::IllegalPhaseTransition { .. }));
        assert_eq!(
            state.apply(1, &ActionKind::RollDice).unwrap_err(),
            GameError::NotYourTurn(1)
        );
    }

    #[test]
    fn seven_with_small_hands_goes_straight_to_robber() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((3, 4));
        state.apply(0, &ActionKind::RollDice).unwrap();
        assert_eq!(state.phase(), Phase::RobberMove);
        assert_eq!(state.robber_step(), Some(&RobberStep::MoveTile));
        assert!(state.apply(0, &ActionKind::MoveRobber(state.board().robber_tile())).is_err());
        state.apply(0, &ActionKind::MoveRobber(1)).unwrap();
        assert!(matches!(state.phase(), Phase::NormalPlay | Phase::RobberMove));
    }

    #[test]
    fn bought_card_cannot_be_played_same_turn() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((2, 2));
        state.apply(0, &ActionKind::RollDice).unwrap();
        give(&mut state, 0, COST_DEVELOPMENT);
        state.apply(0, &ActionKind::BuyDevelopmentCard).unwrap();
        assert_eq!(state.deck_len(), 24);
        for play in [
            DevCardPlay::Monopoly(Resource::Ore),
            DevCardPlay::YearOfPlenty(Resource::Ore, Resource::Wood),
        ] {
            assert!(matches!(
                state.apply(0, &ActionKind::PlayDevelopmentCard(play)),
                Err(GameError::DevelopmentCardUnavailable(_))
            ));
        }
        state.verify_invariants().unwrap();
    }

    #[test]
    fn bank_trade_uses_four_to_one_without_harbor() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((2, 2));
        state.apply(0, &ActionKind::RollDice).unwrap();
        let ratio = state.bank_ratio(0, Resource::Brick);
        let before = state.inventory(0).unwrap().resource(Resource::Brick);
        give(&mut state, 0, ResourceBundle::single(Resource::Brick, ratio));
        state
            .apply(
                0,
                &ActionKind::BankTrade {
                    give: Resource::Brick,
                    receive: Resource::Ore,
                },
            )
            .unwrap();
        assert_eq!(state.inventory(0).unwrap().resource(Resource::Brick), before);
        assert!(state.trade_attempted());
        assert_eq!(
            state.apply(
                0,
                &ActionKind::BankTrade {
                    give: Resource::Ore,
                    receive: Resource::Ore
                }
            ),
            Err(GameError::InvalidPayload("bank trade needs two different kinds"))
        );
        state.verify_invariants().unwrap();
    }

    #[test]
    fn end_turn_cancels_open_trades_and_matures_cards() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((2, 2));
        state.apply(0, &ActionKind::RollDice).unwrap();
        give(&mut state, 0, ResourceBundle::single(Resource::Ore, 1));
        state
            .apply(
                0,
                &ActionKind::OpenTrade {
                    code: 1,
                    wish: ResourceBundle::single(Resource::Wood, 1),
                    offer: ResourceBundle::single(Resource::Ore, 1),
                },
            )
            .unwrap();
        let events = state.apply(0, &ActionKind::EndTurn).unwrap();
        assert!(events.contains(&GameEvent::TradeStateChanged {
            code: 1,
            status: TradeStatus::Cancelled
        }));
        assert_eq!(state.current_player(), 1);
        assert!(state.awaiting_roll());
    }

    fn give_card(state: &mut GameState, player: PlayerId, card: DevelopmentCard) {
        state.inventories[player].add_development_card(card);
        state.inventories[player].mature_development_cards();
    }

    /// Roll a four if needed, then end the turn.
    fn pass_turn(state: &mut GameState) {
        let player = state.current_player();
        if state.awaiting_roll() {
            state.queue_dice((2, 2));
            state.apply(player, &ActionKind::RollDice).unwrap();
        }
        state.apply(player, &ActionKind::EndTurn).unwrap();
    }

    /// What `player` should collect on `roll`, counted from the board.
    fn owed(state: &GameState, player: PlayerId, roll: u8) -> ResourceBundle {
        let mut bundle = ResourceBundle::zero();
        for tile in state.board().tiles() {
            let Some(resource) = tile.terrain.resource() else {
                continue;
            };
            if tile.number != Some(roll) || tile.robber {
                continue;
            }
            for vertex in tile.vertices {
                match state.board().vertex(vertex).and_then(|spot| spot.building) {
                    Some(building) if building.owner == player => {
                        let share = match building.level {
                            BuildingLevel::Settlement => 1,
                            BuildingLevel::City => 2,
                        };
                        bundle.add(resource, share);
                    }
                    _ => {}
                }
            }
        }
        bundle
    }

    /// Upgrade one of player 0's settlements that sits on a numbered tile
    /// without the robber. Returns that tile.
    fn city_on_numbered_tile(state: &mut GameState) -> TileId {
        let (vertex, tile) = state
            .board()
            .buildings_of(0)
            .find_map(|(spot, _)| {
                let tile = spot.tiles.iter().copied().find(|tile| {
                    let tile = &state.board().tiles()[*tile as usize];
                    tile.number.is_some() && tile.terrain.resource().is_some() && !tile.robber
                })?;
                Some((spot.id, tile))
            })
            .unwrap();
        state.board.upgrade_to_city(vertex, 0).unwrap();
        tile
    }

    #[test]
    fn cities_collect_double_and_the_robbed_tile_nothing() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        let tile = city_on_numbered_tile(&mut state);
        let resource = state.board().tiles()[tile as usize].terrain.resource().unwrap();
        let roll = state.board().tiles()[tile as usize].number.unwrap();
        set_hand(&mut state, 0, [0; 5]);
        set_hand(&mut state, 1, [0; 5]);

        let expected = owed(&state, 0, roll);
        assert!(expected.get(resource) >= 2);
        let mut events = Vec::new();
        state.produce(roll, &mut events);
        assert_eq!(*state.inventory(0).unwrap().resources(), expected);
        assert!(events.contains(&GameEvent::ResourcesProduced {
            player: 0,
            bundle: expected,
        }));

        set_hand(&mut state, 0, [0; 5]);
        state.board.move_robber(tile).unwrap();
        let robbed = owed(&state, 0, roll);
        assert!(robbed.get(resource) + 2 <= expected.get(resource));
        state.produce(roll, &mut Vec::new());
        assert_eq!(*state.inventory(0).unwrap().resources(), robbed);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn short_bank_withholds_the_whole_resource() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        let tile = city_on_numbered_tile(&mut state);
        let resource = state.board().tiles()[tile as usize].terrain.resource().unwrap();
        let roll = state.board().tiles()[tile as usize].number.unwrap();
        set_hand(&mut state, 0, [0; 5]);
        set_hand(&mut state, 1, [0; 5]);

        // Leave one card in the bank against a claim of at least two.
        let spare = state.bank().resource(resource) - 1;
        give(&mut state, 1, ResourceBundle::single(resource, spare));
        let mut events = Vec::new();
        state.produce(roll, &mut events);

        assert!(events.contains(&GameEvent::ProductionWithheld { resource }));
        assert_eq!(state.inventory(0).unwrap().resource(resource), 0);
        assert_eq!(state.inventory(1).unwrap().resource(resource), spare);
        assert_eq!(state.bank().resource(resource), 1);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn one_development_card_per_turn() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        give_card(&mut state, 0, DevelopmentCard::YearOfPlenty);
        give_card(&mut state, 0, DevelopmentCard::Monopoly);

        let plenty = DevCardPlay::YearOfPlenty(Resource::Ore, Resource::Wheat);
        state.apply(0, &ActionKind::PlayDevelopmentCard(plenty)).unwrap();
        assert!(state.card_played_this_turn());
        let monopoly = ActionKind::PlayDevelopmentCard(DevCardPlay::Monopoly(Resource::Wood));
        assert_eq!(
            state.apply(0, &monopoly),
            Err(GameError::DevelopmentCardUnavailable(DevelopmentCard::Monopoly))
        );
        assert_eq!(state.inventory(0).unwrap().playable_count(DevelopmentCard::Monopoly), 1);

        pass_turn(&mut state);
        pass_turn(&mut state);
        assert!(!state.card_played_this_turn());
        state.apply(0, &monopoly).unwrap();
        state.verify_invariants().unwrap();
    }

    fn play_knight(state: &mut GameState, player: PlayerId) -> Vec<GameEvent> {
        give_card(state, player, DevelopmentCard::Knight);
        let tile = state
            .board()
            .land_tiles()
            .find(|tile| !tile.robber && tile.terrain.resource().is_some())
            .unwrap()
            .id;
        let knight = ActionKind::PlayDevelopmentCard(DevCardPlay::Knight { tile });
        let mut events = state.apply(player, &knight).unwrap();
        assert_eq!(state.board().robber_tile(), tile);
        if let Some(RobberStep::Draw { candidates }) = state.robber_step().cloned() {
            let draw = ActionKind::DrawFromPlayer(candidates[0]);
            events.extend(state.apply(player, &draw).unwrap());
        }
        events
    }

    fn army_events(events: &[GameEvent]) -> Vec<&GameEvent> {
        events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    GameEvent::AchievementChanged {
                        flag: Achievement::LargestArmy,
                        ..
                    }
                )
            })
            .collect()
    }

    #[test]
    fn largest_army_needs_three_and_a_strict_lead() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);

        for _ in 0..2 {
            for player in 0..2 {
                assert!(army_events(&play_knight(&mut state, player)).is_empty());
                pass_turn(&mut state);
            }
        }
        assert_eq!(state.largest_army_holder(), None);

        let events = play_knight(&mut state, 0);
        assert_eq!(
            army_events(&events),
            vec![&GameEvent::AchievementChanged {
                flag: Achievement::LargestArmy,
                holder: Some(0),
            }]
        );
        assert_eq!(state.inventory(0).unwrap().public_points(), 4);
        pass_turn(&mut state);

        // Three apiece: the holder keeps the flag.
        assert!(army_events(&play_knight(&mut state, 1)).is_empty());
        assert_eq!(state.largest_army_holder(), Some(0));
        pass_turn(&mut state);
        pass_turn(&mut state);

        play_knight(&mut state, 1);
        assert_eq!(state.largest_army_holder(), Some(1));
        assert!(!state.inventory(0).unwrap().has_achievement(Achievement::LargestArmy));
        assert!(state.inventory(1).unwrap().has_achievement(Achievement::LargestArmy));
        assert_eq!(state.inventory(0).unwrap().public_points(), 2);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn road_building_lays_one_or_two_free_roads() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        give_card(&mut state, 0, DevelopmentCard::RoadBuilding);
        let hand = *state.inventory(0).unwrap().resources();

        let first = state.board().legal_road_spots(0, false)[0];
        let mut preview = state.board().clone();
        preview.place_road(first, 0, false).unwrap();
        let second = preview.legal_road_spots(0, false)[0];
        let play = DevCardPlay::RoadBuilding(first, Some(second));
        state.apply(0, &ActionKind::PlayDevelopmentCard(play)).unwrap();
        for edge in [first, second] {
            assert_eq!(state.board().edge(edge).unwrap().occupant, Some(0));
        }
        assert_eq!(state.inventory(0).unwrap().stock().roads, 11);
        assert_eq!(*state.inventory(0).unwrap().resources(), hand);

        pass_turn(&mut state);
        pass_turn(&mut state);
        give_card(&mut state, 0, DevelopmentCard::RoadBuilding);
        let third = state.board().legal_road_spots(0, false)[0];
        let play = DevCardPlay::RoadBuilding(third, None);
        state.apply(0, &ActionKind::PlayDevelopmentCard(play)).unwrap();
        assert_eq!(state.board().edge(third).unwrap().occupant, Some(0));
        assert_eq!(state.inventory(0).unwrap().stock().roads, 10);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn monopoly_collects_every_opponent_card_of_a_kind() {
        let mut state = GameState::new(config(3));
        finish_setup(&mut state);
        set_hand(&mut state, 0, [1, 0, 0, 0, 0]);
        set_hand(&mut state, 1, [2, 0, 0, 0, 1]);
        set_hand(&mut state, 2, [3, 1, 0, 0, 0]);
        give_card(&mut state, 0, DevelopmentCard::Monopoly);

        let play = DevCardPlay::Monopoly(Resource::Wood);
        let events = state.apply(0, &ActionKind::PlayDevelopmentCard(play)).unwrap();
        assert!(events.contains(&GameEvent::DevelopmentCardPlayed {
            player: 0,
            card: DevelopmentCard::Monopoly,
        }));
        let hands: Vec<[u8; 5]> = state
            .inventories()
            .iter()
            .map(|inventory| inventory.resources().counts())
            .collect();
        assert_eq!(hands, vec![[6, 0, 0, 0, 0], [0, 0, 0, 0, 1], [0, 1, 0, 0, 0]]);
        state.verify_invariants().unwrap();
    }

    /// A tile next to one of `victim`'s buildings that the robber can move to.
    fn tile_of(state: &GameState, victim: PlayerId) -> TileId {
        state
            .board()
            .buildings_of(victim)
            .flat_map(|(spot, _)| spot.tiles.iter().copied())
            .find(|tile| state.board().validate_robber_move(*tile).is_ok())
            .unwrap()
    }

    #[test]
    fn robber_draws_from_a_listed_candidate() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        set_hand(&mut state, 0, [0; 5]);
        set_hand(&mut state, 1, [1, 0, 0, 0, 0]);
        state.queue_dice((3, 4));
        state.apply(0, &ActionKind::RollDice).unwrap();

        let tile = tile_of(&state, 1);
        state.apply(0, &ActionKind::MoveRobber(tile)).unwrap();
        assert_eq!(
            state.robber_step(),
            Some(&RobberStep::Draw {
                candidates: vec![1]
            })
        );
        assert!(matches!(
            state.apply(0, &ActionKind::DrawFromPlayer(0)),
            Err(GameError::InvalidPayload(_))
        ));
        assert!(matches!(
            state.apply(0, &ActionKind::MoveRobber(tile)),
            Err(GameError::IllegalPhaseTransition { .. })
        ));

        let events = state.apply(0, &ActionKind::DrawFromPlayer(1)).unwrap();
        assert!(events.contains(&GameEvent::ResourceDrawn {
            thief: 0,
            victim: 1,
            resource: Some(Resource::Wood),
        }));
        assert_eq!(state.inventory(0).unwrap().resource(Resource::Wood), 1);
        assert_eq!(state.inventory(1).unwrap().resource_count(), 0);
        assert_eq!(state.phase(), Phase::NormalPlay);
        state.verify_invariants().unwrap();
    }

    #[test]
    fn robber_without_candidates_resumes_play() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        set_hand(&mut state, 1, [0; 5]);
        state.queue_dice((3, 4));
        state.apply(0, &ActionKind::RollDice).unwrap();

        let tile = tile_of(&state, 1);
        state.apply(0, &ActionKind::MoveRobber(tile)).unwrap();
        assert_eq!(state.phase(), Phase::NormalPlay);
        assert_eq!(state.robber_step(), None);
        assert!(matches!(
            state.apply(0, &ActionKind::DrawFromPlayer(1)),
            Err(GameError::IllegalPhaseTransition { .. })
        ));
    }

    #[test]
    fn stale_bid_is_voided_and_the_trade_reopens() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((2, 2));
        state.apply(0, &ActionKind::RollDice).unwrap();
        set_hand(&mut state, 0, [0, 0, 0, 0, 1]);
        set_hand(&mut state, 1, [0, 0, 0, 1, 0]);
        let wheat = ResourceBundle::single(Resource::Wheat, 1);
        let open = ActionKind::OpenTrade {
            code: 1,
            wish: wheat,
            offer: ResourceBundle::single(Resource::Ore, 1),
        };
        state.apply(0, &open).unwrap();
        state.apply(1, &ActionKind::OfferBid { code: 1, bid: wheat }).unwrap();

        set_hand(&mut state, 1, [0; 5]);
        let before = state.inventories().to_vec();
        assert_eq!(
            state.apply(0, &ActionKind::AcceptBid { code: 1, bidder: 1 }),
            Err(GameError::TradeQuantityMismatch { code: 1, bidder: 1 })
        );
        let trade = state.trades().get(1).unwrap();
        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.bids.is_empty());
        assert_eq!(state.inventories(), &before[..]);
        state.verify_invariants().unwrap();
    }

    /// A harbor vertex matching `wanted` where player 0 may still settle.
    fn free_harbor(state: &GameState, wanted: impl Fn(Harbor) -> bool) -> (VertexId, Harbor) {
        state
            .board()
            .vertices()
            .iter()
            .find_map(|spot| {
                let harbor = spot.harbor.filter(|harbor| wanted(*harbor))?;
                state
                    .board()
                    .can_place_settlement(spot.id, 0, true)
                    .then_some((spot.id, harbor))
            })
            .unwrap()
    }

    #[test]
    fn owned_harbors_set_two_and_three_to_one() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        state.queue_dice((2, 2));
        state.apply(0, &ActionKind::RollDice).unwrap();

        let (generic, _) = free_harbor(&state, |harbor| harbor == Harbor::Generic);
        state.board.place_settlement(generic, 0, true).unwrap();
        for resource in Resource::ALL {
            assert!(state.bank_ratio(0, resource) <= 3);
        }
        let (special, harbor) = free_harbor(&state, |harbor| matches!(harbor, Harbor::Special(_)));
        let Harbor::Special(cheap) = harbor else {
            unreachable!()
        };
        state.board.place_settlement(special, 0, true).unwrap();
        assert_eq!(state.bank_ratio(0, cheap), 2);

        let receive = Resource::ALL.into_iter().find(|kind| *kind != cheap).unwrap();
        set_hand(&mut state, 0, [0; 5]);
        give(&mut state, 0, ResourceBundle::single(cheap, 2));
        let events = state
            .apply(0, &ActionKind::BankTrade { give: cheap, receive })
            .unwrap();
        assert!(events.contains(&GameEvent::BankTraded {
            player: 0,
            give: ResourceBundle::single(cheap, 2),
            receive,
        }));
        assert_eq!(*state.inventory(0).unwrap().resources(), ResourceBundle::single(receive, 1));

        let generic_kind = Resource::ALL
            .into_iter()
            .find(|kind| state.bank_ratio(0, *kind) == 3)
            .unwrap();
        let other = Resource::ALL
            .into_iter()
            .find(|kind| *kind != generic_kind)
            .unwrap();
        set_hand(&mut state, 0, [0; 5]);
        give(&mut state, 0, ResourceBundle::single(generic_kind, 3));
        state
            .apply(
                0,
                &ActionKind::BankTrade {
                    give: generic_kind,
                    receive: other,
                },
            )
            .unwrap();
        assert_eq!(*state.inventory(0).unwrap().resources(), ResourceBundle::single(other, 1));
        state.verify_invariants().unwrap();
    }

    #[test]
    fn hidden_victory_cards_count_toward_the_win() {
        let mut state = GameState::new(config(2));
        finish_setup(&mut state);
        for _ in 0..8 {
            state.inventories[0].add_development_card(DevelopmentCard::VictoryPoint);
        }
        assert_eq!(state.inventory(0).unwrap().public_points(), 2);
        assert_eq!(state.winner(), None);

        state.queue_dice((2, 2));
        let events = state.apply(0, &ActionKind::RollDice).unwrap();
        assert!(events.contains(&GameEvent::GameConcluded {
            winner: 0,
            scores: vec![10, 2],
        }));
        assert_eq!(state.phase(), Phase::Concluded);
        assert_eq!(state.winner(), Some(0));
        assert!(matches!(
            state.apply(0, &ActionKind::EndTurn),
            Err(GameError::IllegalPhaseTransition { .. })
        ));
    }

    #[test]
    fn invariant_check_catches_leaked_resources() {
        let mut state = GameState::new(config(2));
        state.inventories[0].increase(Resource::Wood, 1);
        assert!(matches!(
            state.verify_invariants(),
            Err(GameError::InvariantViolation(_))
        ));
    }
}
