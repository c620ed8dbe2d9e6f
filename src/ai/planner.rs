use std::cmp::Reverse;

use itertools::Itertools;
use tracing::debug;

use crate::board::{EdgeId, TileId, VertexId};
use crate::game::action::{Action, ActionKind, DevCardPlay};
use crate::game::resources::{
    COST_CITY, COST_DEVELOPMENT, COST_ROAD, COST_SETTLEMENT, ResourceBundle,
};
use crate::game::setup::SetupPrompt;
use crate::game::state::{Phase, RobberStep};
use crate::trade::TradeSession;
use crate::types::{BuildingLevel, DevelopmentCard, PlayerId, Resource};

use super::snapshot::Snapshot;

/// Weights for the heuristic scores the planner ranks choices with.
#[derive(Debug, Clone)]
pub struct PlannerParams {
    /// Per pip of a producing tile next to a spot.
    pub pips: f64,
    /// Per distinct resource kind a spot touches.
    pub variety: f64,
    /// Per kind at a spot the seat does not produce yet.
    pub new_resource: f64,
    pub harbor: f64,
    /// How much a road values the spots one step past its far end.
    pub road_lookahead: f64,
    /// Scales the damage done to an opponent by their public points.
    pub leader_weight: f64,
    /// Penalty per pip of the seat's own buildings under the robber.
    pub own_robber_penalty: f64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            pips: 1.0,
            variety: 2.0,
            new_resource: 1.5,
            harbor: 1.0,
            road_lookahead: 0.5,
            leader_weight: 1.0,
            own_robber_penalty: 10.0,
        }
    }
}

/// Deterministic rule-based player. Same snapshot, same plan.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    pub params: PlannerParams,
}

/// Working copy of the snapshot, updated as actions are planned so later
/// choices see the effect of earlier ones.
struct Draft {
    view: Snapshot,
    actions: Vec<ActionKind>,
}

impl Draft {
    fn push(&mut self, kind: ActionKind) {
        self.actions.push(kind);
    }
}

/// First item with the strictly highest score. Callers iterate in id order,
/// so ties resolve to the lowest id.
fn best_by<T: Copy>(items: impl IntoIterator<Item = T>, score: impl Fn(T) -> f64) -> Option<T> {
    let mut best: Option<(T, f64)> = None;
    for item in items {
        let value = score(item);
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((item, value));
        }
    }
    best.map(|(item, _)| item)
}

impl Planner {
    pub fn new(params: PlannerParams) -> Self {
        Self { params }
    }

    /// Whether the outcome of `kind` is unknown until applied. Plans stop
    /// after such an action and the caller replans.
    pub fn is_chance_boundary(kind: &ActionKind) -> bool {
        matches!(
            kind,
            ActionKind::RollDice
                | ActionKind::MoveRobber(_)
                | ActionKind::DrawFromPlayer(_)
                | ActionKind::PlayDevelopmentCard(
                    DevCardPlay::Knight { .. } | DevCardPlay::Monopoly(_)
                )
        )
    }

    pub fn plan(&self, snapshot: &Snapshot) -> Vec<Action> {
        let mut draft = Draft {
            view: snapshot.clone(),
            actions: Vec::new(),
        };
        match snapshot.phase {
            Phase::StartingPlacement if snapshot.is_my_turn() => self.plan_placement(&mut draft),
            Phase::RobberDiscard => {
                if let Some(count) = snapshot.discard_due {
                    self.plan_discard(&mut draft, count);
                }
            }
            Phase::RobberMove if snapshot.is_my_turn() => self.plan_robber(&mut draft),
            Phase::NormalPlay if snapshot.is_my_turn() => self.plan_turn(&mut draft),
            Phase::NormalPlay => self.plan_bids(&mut draft),
            _ => {}
        }

        debug!(
            player = snapshot.me,
            phase = %snapshot.phase,
            planned = ?draft.actions.iter().map(ActionKind::action_type).collect::<Vec<_>>(),
            "plan ready"
        );
        draft
            .actions
            .into_iter()
            .map(|kind| Action::new(snapshot.session, snapshot.me, kind))
            .collect()
    }

    // Starting placement

    fn plan_placement(&self, draft: &mut Draft) {
        let me = draft.view.me;
        match draft.view.setup_prompt {
            Some(SetupPrompt::Settlement) => {
                let Some(vertex) = self.best_settlement_spot(&draft.view, true) else {
                    return;
                };
                draft.push(ActionKind::PlaceSettlement(vertex));
                if draft.view.board.place_settlement(vertex, me, true).is_err() {
                    return;
                }
                if let Some(edge) = self.best_road(&draft.view, true) {
                    draft.push(ActionKind::PlaceRoad(edge));
                }
            }
            Some(SetupPrompt::Road) => {
                if let Some(edge) = self.best_road(&draft.view, true) {
                    draft.push(ActionKind::PlaceRoad(edge));
                }
            }
            None => {}
        }
    }

    fn produced_kinds(&self, view: &Snapshot) -> [bool; 5] {
        let mut produced = [false; 5];
        for (vertex, _) in view.board.buildings_of(view.me) {
            for tile in &vertex.tiles {
                if let Some(resource) = view.board.tiles()[*tile as usize].terrain.resource() {
                    produced[resource.index()] = true;
                }
            }
        }
        produced
    }

    fn spot_value(&self, view: &Snapshot, vertex: VertexId, produced: &[bool; 5]) -> f64 {
        let Some(spot) = view.board.vertex(vertex) else {
            return 0.0;
        };
        let kinds: Vec<Resource> = spot
            .tiles
            .iter()
            .filter_map(|tile| {
                let tile = &view.board.tiles()[*tile as usize];
                tile.number.and(tile.terrain.resource())
            })
            .unique()
            .collect();
        let fresh = kinds.iter().filter(|kind| !produced[kind.index()]).count();

        let mut value = view.board.vertex_pips(vertex) as f64 * self.params.pips
            + kinds.len() as f64 * self.params.variety
            + fresh as f64 * self.params.new_resource;
        if spot.harbor.is_some() {
            value += self.params.harbor;
        }
        value
    }

    /// Value of `vertex` as a future settlement, zero if the distance rule
    /// already blocks it.
    fn open_spot_value(&self, view: &Snapshot, vertex: VertexId, produced: &[bool; 5]) -> f64 {
        if view.board.can_place_settlement(vertex, view.me, true) {
            self.spot_value(view, vertex, produced)
        } else {
            0.0
        }
    }

    fn best_settlement_spot(&self, view: &Snapshot, starting: bool) -> Option<VertexId> {
        let produced = self.produced_kinds(view);
        best_by(view.board.legal_settlement_spots(view.me, starting), |vertex| {
            self.spot_value(view, vertex, &produced)
        })
    }

    fn road_value(&self, view: &Snapshot, edge: EdgeId, produced: &[bool; 5]) -> f64 {
        let Some(edge) = view.board.edge(edge) else {
            return 0.0;
        };
        edge.vertices
            .iter()
            .map(|vertex| {
                let here = self.open_spot_value(view, *vertex, produced);
                let beyond = view
                    .board
                    .vertex(*vertex)
                    .map(|spot| {
                        spot.neighbors
                            .iter()
                            .map(|next| self.open_spot_value(view, *next, produced))
                            .fold(0.0, f64::max)
                    })
                    .unwrap_or(0.0);
                here + beyond * self.params.road_lookahead
            })
            .fold(0.0, f64::max)
    }

    fn best_road(&self, view: &Snapshot, starting: bool) -> Option<EdgeId> {
        let produced = self.produced_kinds(view);
        best_by(view.board.legal_road_spots(view.me, starting), |edge| {
            self.road_value(view, edge, &produced)
        })
    }

    // Sevens

    /// Resources worth holding on to: enough for a settlement and a city.
    fn wanted(&self) -> ResourceBundle {
        let mut wanted = COST_SETTLEMENT;
        wanted.add_bundle(&COST_CITY);
        wanted
    }

    fn plan_discard(&self, draft: &mut Draft, count: u8) {
        let wanted = self.wanted();
        let mut hand = *draft.view.hand();
        let mut discard = ResourceBundle::zero();
        for _ in 0..count {
            let pick = Resource::ALL
                .into_iter()
                .filter(|resource| hand.get(*resource) > 0)
                .max_by_key(|resource| {
                    let excess = hand.get(*resource) as i16 - wanted.get(*resource) as i16;
                    (excess, Reverse(resource.index()))
                });
            let Some(resource) = pick else {
                break;
            };
            if hand.subtract(resource, 1).is_err() {
                break;
            }
            discard.add(resource, 1);
        }
        draft.view.own.resources = hand;
        draft.push(ActionKind::DiscardResources(discard));
    }

    fn plan_robber(&self, draft: &mut Draft) {
        match draft.view.robber_step.clone() {
            Some(RobberStep::MoveTile) => {
                let Some(tile) = self.robber_target(&draft.view) else {
                    return;
                };
                draft.push(ActionKind::MoveRobber(tile));
                if let Some(victim) = self.victim_on(&draft.view, tile) {
                    draft.push(ActionKind::DrawFromPlayer(victim));
                }
            }
            Some(RobberStep::Draw { candidates }) => {
                if let Some(victim) = self.richest(&draft.view, candidates) {
                    draft.push(ActionKind::DrawFromPlayer(victim));
                }
            }
            None => {}
        }
    }

    /// Tile that costs opponents the most production, weighted toward the
    /// leaders, while sparing the seat's own buildings.
    fn robber_target(&self, view: &Snapshot) -> Option<TileId> {
        let board = &view.board;
        let candidates = board
            .land_tiles()
            .filter(|tile| board.validate_robber_move(tile.id).is_ok())
            .map(|tile| tile.id)
            .collect_vec();
        best_by(candidates, |tile_id| {
            let tile = &board.tiles()[tile_id as usize];
            let pips = tile.number.map(crate::board::number_pips).unwrap_or(0) as f64;
            tile.vertices
                .iter()
                .filter_map(|vertex| board.vertices()[*vertex as usize].building)
                .map(|building| {
                    let weight = building.level.yield_multiplier() as f64 * pips;
                    if building.owner == view.me {
                        -weight * self.params.own_robber_penalty
                    } else {
                        let points = view.public_points_of(building.owner) as f64;
                        weight * (1.0 + points * self.params.leader_weight)
                    }
                })
                .sum()
        })
    }

    fn victim_on(&self, view: &Snapshot, tile: TileId) -> Option<PlayerId> {
        let candidates = view
            .board
            .owners_on_tile(tile)
            .into_iter()
            .filter(|owner| *owner != view.me && view.hand_size_of(*owner) > 0)
            .collect_vec();
        self.richest(view, candidates)
    }

    fn richest(&self, view: &Snapshot, candidates: Vec<PlayerId>) -> Option<PlayerId> {
        best_by(candidates, |player| view.hand_size_of(player) as f64)
    }

    // Normal play

    fn plan_turn(&self, draft: &mut Draft) {
        let me = draft.view.me;
        if let Some(trade) = draft
            .view
            .open_trades
            .iter()
            .find(|trade| trade.seller == me)
            .cloned()
        {
            self.decide_own_trade(draft, &trade);
        }

        if draft.view.awaiting_roll {
            if self.robber_on_me(&draft.view)
                && self.playable(&draft.view, DevelopmentCard::Knight)
            {
                self.play_knight(draft);
                return;
            }
            draft.push(ActionKind::RollDice);
            return;
        }

        if self.play_development_card(draft) {
            return;
        }
        self.build(draft);
        if !draft.view.trade_attempted {
            if self.trade_with_bank(draft) {
                self.build(draft);
            } else if self.open_trade(draft) {
                return;
            }
        }
        draft.push(ActionKind::EndTurn);
    }

    fn build(&self, draft: &mut Draft) {
        self.build_cities(draft);
        self.build_settlements(draft);
        self.build_roads(draft);
        self.buy_development_cards(draft);
    }

    fn playable(&self, view: &Snapshot, card: DevelopmentCard) -> bool {
        !view.card_played_this_turn && view.own.playable.get(card) > 0
    }

    fn robber_on_me(&self, view: &Snapshot) -> bool {
        view.board
            .owners_on_tile(view.board.robber_tile())
            .contains(&view.me)
    }

    fn play_knight(&self, draft: &mut Draft) {
        let Some(tile) = self.robber_target(&draft.view) else {
            return;
        };
        draft.push(ActionKind::PlayDevelopmentCard(DevCardPlay::Knight { tile }));
        draft.view.card_played_this_turn = true;
        if let Some(victim) = self.victim_on(&draft.view, tile) {
            draft.push(ActionKind::DrawFromPlayer(victim));
        }
    }

    /// Plays at most one card. Returns true when the plan has to stop
    /// because the card's outcome is unknown.
    fn play_development_card(&self, draft: &mut Draft) -> bool {
        let view = &draft.view;
        if self.playable(view, DevelopmentCard::Knight) {
            let strongest_army = view
                .opponents
                .values()
                .map(|opponent| opponent.knights_played)
                .max()
                .unwrap_or(0);
            let knights = view.own.knights_played + 1;
            let contends = !view.own.largest_army
                && knights >= crate::types::Achievement::LargestArmy.threshold()
                && knights > strongest_army;
            if self.robber_on_me(view) || contends {
                self.play_knight(draft);
                return true;
            }
        }

        if self.playable(&draft.view, DevelopmentCard::RoadBuilding)
            && draft.view.own.stock.roads > 0
            && self.play_road_building(draft)
        {
            return false;
        }

        let Some(target) = self.target_cost(&draft.view) else {
            return false;
        };
        let missing = draft.view.hand().missing_for(&target);

        if self.playable(&draft.view, DevelopmentCard::YearOfPlenty)
            && (1..=2).contains(&missing.total())
        {
            let mut picks = missing
                .iter()
                .flat_map(|(resource, amount)| std::iter::repeat_n(resource, amount as usize))
                .collect_vec();
            if picks.len() == 1 {
                picks.push(picks[0]);
            }
            let mut bundle = ResourceBundle::single(picks[0], 1);
            bundle.add(picks[1], 1);
            if draft.view.bank.can_afford(&bundle) {
                draft.push(ActionKind::PlayDevelopmentCard(DevCardPlay::YearOfPlenty(
                    picks[0], picks[1],
                )));
                draft.view.card_played_this_turn = true;
                draft.view.own.resources.add_bundle(&bundle);
                return false;
            }
        }

        if self.playable(&draft.view, DevelopmentCard::Monopoly) {
            let others: u32 = draft.view.opponents.values().map(|o| o.resource_count).sum();
            let wanted = missing
                .iter()
                .filter(|(_, amount)| *amount > 0)
                .sorted_by_key(|(resource, amount)| (Reverse(*amount), resource.index()))
                .map(|(resource, _)| resource)
                .next();
            if let Some(resource) = wanted {
                if others >= draft.view.opponents.len() as u32 * 2 {
                    draft.push(ActionKind::PlayDevelopmentCard(DevCardPlay::Monopoly(resource)));
                    draft.view.card_played_this_turn = true;
                    return true;
                }
            }
        }
        false
    }

    fn play_road_building(&self, draft: &mut Draft) -> bool {
        let me = draft.view.me;
        let Some(first) = self.best_road(&draft.view, false) else {
            return false;
        };
        if draft.view.board.place_road(first, me, false).is_err() {
            return false;
        }
        draft.view.own.stock.roads -= 1;
        let second = if draft.view.own.stock.roads > 0 {
            self.best_road(&draft.view, false)
        } else {
            None
        };
        if let Some(second) = second {
            if draft.view.board.place_road(second, me, false).is_ok() {
                draft.view.own.stock.roads -= 1;
            }
        }
        draft.push(ActionKind::PlayDevelopmentCard(DevCardPlay::RoadBuilding(
            first, second,
        )));
        draft.view.card_played_this_turn = true;
        true
    }

    /// Cheapest build the seat can still make use of. Ties keep the order
    /// city, settlement, road, development card.
    fn target_cost(&self, view: &Snapshot) -> Option<ResourceBundle> {
        let me = view.me;
        let stock = view.own.stock;
        let has_settlement = view
            .board
            .buildings_of(me)
            .any(|(_, level)| level == BuildingLevel::Settlement);
        let options = [
            (stock.cities > 0 && has_settlement, COST_CITY),
            (
                stock.settlements > 0 && !view.board.legal_settlement_spots(me, false).is_empty(),
                COST_SETTLEMENT,
            ),
            (
                stock.roads > 0 && !view.board.legal_road_spots(me, false).is_empty(),
                COST_ROAD,
            ),
            (view.deck_len > 0, COST_DEVELOPMENT),
        ];
        options
            .into_iter()
            .filter(|(usable, _)| *usable)
            .map(|(_, cost)| cost)
            .min_by_key(|cost| view.hand().missing_for(cost).total())
    }

    fn pay(draft: &mut Draft, cost: &ResourceBundle) -> bool {
        draft.view.own.resources.subtract_bundle(cost).is_ok()
    }

    fn build_cities(&self, draft: &mut Draft) {
        let me = draft.view.me;
        while draft.view.own.stock.cities > 0 && draft.view.hand().can_afford(&COST_CITY) {
            let settlements = draft
                .view
                .board
                .buildings_of(me)
                .filter(|(_, level)| *level == BuildingLevel::Settlement)
                .map(|(vertex, _)| vertex.id)
                .collect_vec();
            let pips = |vertex: VertexId| draft.view.board.vertex_pips(vertex) as f64;
            let Some(vertex) = best_by(settlements, pips) else {
                return;
            };
            if draft.view.board.upgrade_to_city(vertex, me).is_err()
                || !Self::pay(draft, &COST_CITY)
            {
                return;
            }
            draft.view.own.stock.cities -= 1;
            draft.push(ActionKind::UpgradeToCity(vertex));
        }
    }

    fn build_settlements(&self, draft: &mut Draft) {
        let me = draft.view.me;
        while draft.view.own.stock.settlements > 0
            && draft.view.hand().can_afford(&COST_SETTLEMENT)
        {
            let Some(vertex) = self.best_settlement_spot(&draft.view, false) else {
                return;
            };
            if draft.view.board.place_settlement(vertex, me, false).is_err()
                || !Self::pay(draft, &COST_SETTLEMENT)
            {
                return;
            }
            draft.view.own.stock.settlements -= 1;
            draft.push(ActionKind::PlaceSettlement(vertex));
        }
    }

    /// Roads only when there is nowhere to settle yet and a road leads
    /// somewhere worth going.
    fn build_roads(&self, draft: &mut Draft) {
        let me = draft.view.me;
        for _ in 0..2 {
            let view = &draft.view;
            if view.own.stock.roads == 0
                || !view.hand().can_afford(&COST_ROAD)
                || !view.board.legal_settlement_spots(me, false).is_empty()
            {
                return;
            }
            let produced = self.produced_kinds(view);
            let Some(edge) = self.best_road(view, false) else {
                return;
            };
            if self.road_value(view, edge, &produced) <= 0.0 {
                return;
            }
            if draft.view.board.place_road(edge, me, false).is_err()
                || !Self::pay(draft, &COST_ROAD)
            {
                return;
            }
            draft.view.own.stock.roads -= 1;
            draft.push(ActionKind::PlaceRoad(edge));
        }
    }

    fn buy_development_cards(&self, draft: &mut Draft) {
        if draft.view.deck_len > 0 && draft.view.hand().can_afford(&COST_DEVELOPMENT) {
            if Self::pay(draft, &COST_DEVELOPMENT) {
                draft.view.deck_len -= 1;
                draft.push(ActionKind::BuyDevelopmentCard);
            }
        }
    }

    // Trading

    /// Kind the seat holds beyond `target`, most plentiful first.
    fn surplus(&self, view: &Snapshot, target: &ResourceBundle, at_least: u8) -> Option<Resource> {
        let hand = view.hand();
        Resource::ALL
            .into_iter()
            .filter(|resource| {
                hand.get(*resource).saturating_sub(target.get(*resource)) >= at_least
            })
            .sorted_by_key(|resource| {
                (
                    Reverse(hand.get(*resource).saturating_sub(target.get(*resource))),
                    resource.index(),
                )
            })
            .next()
    }

    fn trade_with_bank(&self, draft: &mut Draft) -> bool {
        let Some(target) = self.target_cost(&draft.view) else {
            return false;
        };
        let missing = draft.view.hand().missing_for(&target);
        for receive in missing.kinds().collect_vec() {
            if draft.view.bank.get(receive) == 0 {
                continue;
            }
            let give = Resource::ALL
                .into_iter()
                .filter(|give| *give != receive)
                .filter(|give| {
                    let ratio = draft.view.bank_ratios[give.index()];
                    draft.view.hand().get(*give).saturating_sub(target.get(*give)) >= ratio
                })
                .min_by_key(|give| (draft.view.bank_ratios[give.index()], give.index()));
            let Some(give) = give else {
                continue;
            };
            let ratio = draft.view.bank_ratios[give.index()];
            if draft.view.own.resources.subtract(give, ratio).is_err() {
                continue;
            }
            draft.view.own.resources.add(receive, 1);
            draft.view.trade_attempted = true;
            draft.push(ActionKind::BankTrade { give, receive });
            return true;
        }
        false
    }

    /// One-for-one offer to the table. The plan pauses here so others can bid.
    fn open_trade(&self, draft: &mut Draft) -> bool {
        let Some(target) = self.target_cost(&draft.view) else {
            return false;
        };
        let missing = draft.view.hand().missing_for(&target);
        let Some(wanted) = missing.kinds().next() else {
            return false;
        };
        let Some(spare) = self.surplus(&draft.view, &target, 1) else {
            return false;
        };
        draft.view.trade_attempted = true;
        draft.push(ActionKind::OpenTrade {
            code: draft.view.next_trade_code,
            wish: ResourceBundle::single(wanted, 1),
            offer: ResourceBundle::single(spare, 1),
        });
        true
    }

    /// Accept the bid that covers the most of the wish, or call the trade off.
    fn decide_own_trade(&self, draft: &mut Draft, trade: &TradeSession) {
        let overlap = |bid: &ResourceBundle| -> u32 {
            Resource::ALL
                .into_iter()
                .map(|resource| bid.get(resource).min(trade.wish.get(resource)) as u32)
                .sum()
        };
        let best = best_by(trade.bids.keys().copied(), |bidder| {
            trade.bids.get(&bidder).map(overlap).unwrap_or(0) as f64
        });
        let accepted = best
            .and_then(|bidder| trade.bids.get(&bidder).map(|bid| (bidder, *bid)))
            .filter(|(_, bid)| overlap(bid) > 0 && draft.view.hand().can_afford(&trade.offer));

        match accepted {
            Some((bidder, bid)) => {
                if Self::pay(draft, &trade.offer) {
                    draft.view.own.resources.add_bundle(&bid);
                }
                draft.push(ActionKind::AcceptBid {
                    code: trade.code,
                    bidder,
                });
            }
            None => draft.push(ActionKind::CancelTrade { code: trade.code }),
        }
        draft.view.open_trades.retain(|open| open.code != trade.code);
    }

    /// Bid the seller's wish when it is spare and the offer helps.
    fn plan_bids(&self, draft: &mut Draft) {
        let me = draft.view.me;
        let target = self.target_cost(&draft.view).unwrap_or_default();
        let trades = draft
            .view
            .open_trades
            .iter()
            .filter(|trade| trade.seller != me && !trade.bids.contains_key(&me))
            .cloned()
            .collect_vec();
        for trade in trades {
            let hand = *draft.view.hand();
            let missing = hand.missing_for(&target);
            let spare = trade
                .wish
                .iter()
                .all(|(resource, amount)| {
                    hand.get(resource).saturating_sub(target.get(resource)) >= amount
                });
            let helps = trade.offer.kinds().any(|resource| missing.get(resource) > 0);
            if !spare || !helps {
                continue;
            }
            if draft.view.own.resources.subtract_bundle(&trade.wish).is_err() {
                continue;
            }
            draft.push(ActionKind::OfferBid {
                code: trade.code,
                bid: trade.wish,
            });
        }
    }
}
