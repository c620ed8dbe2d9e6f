use std::collections::HashMap;

use tracing::debug;

use super::{Board, EdgeId, OwnershipChange, VertexId};
use crate::types::{Achievement, BuildingLevel, PlayerId};

/// One player's owned roads as an adjacency matrix. A cell holds the vertex
/// through which two roads connect, or `None` when they do not touch or an
/// opponent's building sits on the shared vertex.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    edges: Vec<EdgeId>,
    index: HashMap<EdgeId, usize>,
    links: Vec<Vec<Option<VertexId>>>,
    longest: u8,
}

impl RoadNetwork {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn longest(&self) -> u8 {
        self.longest
    }

    fn add_edge(&mut self, board: &Board, player: PlayerId, edge: EdgeId) {
        if self.index.contains_key(&edge) {
            return;
        }
        let Some(new_edge) = board.edge(edge) else {
            return;
        };
        let row: Vec<Option<VertexId>> = self
            .edges
            .iter()
            .map(|existing| {
                let existing = board.edge(*existing)?;
                let shared = new_edge
                    .vertices
                    .iter()
                    .copied()
                    .find(|vertex| existing.touches(*vertex))?;
                let blocked = board
                    .vertex(shared)
                    .and_then(|vertex| vertex.occupant())
                    .is_some_and(|owner| owner != player);
                (!blocked).then_some(shared)
            })
            .collect();
        for (existing_row, link) in self.links.iter_mut().zip(row.iter()) {
            existing_row.push(*link);
        }
        let mut new_row = row;
        new_row.push(None);
        self.links.push(new_row);
        self.index.insert(edge, self.edges.len());
        self.edges.push(edge);
        self.longest = self.longest_path();
    }

    /// Drop every connection running through `vertex`.
    fn sever_at(&mut self, vertex: VertexId) -> bool {
        let mut changed = false;
        for row in self.links.iter_mut() {
            for cell in row.iter_mut() {
                if *cell == Some(vertex) {
                    *cell = None;
                    changed = true;
                }
            }
        }
        if changed {
            self.longest = self.longest_path();
        }
        changed
    }

    /// Longest trail of distinct owned roads, by depth-first search from
    /// every road with backtracking.
    pub fn longest_path(&self) -> u8 {
        let mut visited = vec![false; self.edges.len()];
        let mut best = 0;
        for start in 0..self.edges.len() {
            visited[start] = true;
            best = best.max(1 + self.extend(start, None, &mut visited));
            visited[start] = false;
        }
        best.min(u8::MAX as usize) as u8
    }

    fn extend(&self, current: usize, entered_via: Option<VertexId>, visited: &mut [bool]) -> usize {
        let mut best = 0;
        for (next, link) in self.links[current].iter().enumerate() {
            let Some(via) = *link else {
                continue;
            };
            if visited[next] || Some(via) == entered_via {
                continue;
            }
            visited[next] = true;
            best = best.max(1 + self.extend(next, Some(via), visited));
            visited[next] = false;
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderChange {
    pub previous: Option<PlayerId>,
    pub holder: Option<PlayerId>,
}

/// Tracks every player's road network and who holds the longest road.
#[derive(Debug, Clone)]
pub struct LongestRoadCalculator {
    networks: Vec<RoadNetwork>,
    holder: Option<PlayerId>,
}

impl LongestRoadCalculator {
    pub fn new(num_players: usize) -> Self {
        Self {
            networks: vec![RoadNetwork::default(); num_players],
            holder: None,
        }
    }

    pub fn holder(&self) -> Option<PlayerId> {
        self.holder
    }

    pub fn length_of(&self, player: PlayerId) -> u8 {
        self.networks
            .get(player)
            .map(RoadNetwork::longest)
            .unwrap_or(0)
    }

    pub fn network(&self, player: PlayerId) -> Option<&RoadNetwork> {
        self.networks.get(player)
    }

    /// Fold one board mutation into the networks and re-evaluate the holder.
    /// `board` must already reflect the change.
    pub fn on_ownership_change(
        &mut self,
        board: &Board,
        change: OwnershipChange,
    ) -> Option<HolderChange> {
        match change {
            OwnershipChange::Road { edge, player } => {
                if let Some(network) = self.networks.get_mut(player) {
                    network.add_edge(board, player, edge);
                    debug!(player, edge, length = network.longest(), "road network grew");
                }
            }
            OwnershipChange::Building {
                vertex,
                player,
                level: BuildingLevel::Settlement,
            } => {
                for (other, network) in self.networks.iter_mut().enumerate() {
                    if other != player && network.sever_at(vertex) {
                        debug!(player = other, vertex, length = network.longest(), "road severed");
                    }
                }
            }
            // Upgrades keep the same owner, so no connection changes.
            OwnershipChange::Building { .. } => return None,
        }
        self.reassess()
    }

    fn reassess(&mut self) -> Option<HolderChange> {
        let previous = self.holder;
        let threshold = Achievement::LongestRoad.threshold();

        if let Some(holder) = self.holder {
            if self.length_of(holder) < threshold {
                self.holder = None;
            }
        }

        let floor = match self.holder {
            Some(holder) => self.length_of(holder) + 1,
            None => threshold,
        };
        let best = self
            .networks
            .iter()
            .enumerate()
            .filter(|(player, _)| Some(*player) != self.holder)
            .map(|(_, network)| network.longest())
            .max()
            .unwrap_or(0);
        if best >= floor {
            let leaders: Vec<PlayerId> = self
                .networks
                .iter()
                .enumerate()
                .filter(|(_, network)| network.longest() == best)
                .map(|(player, _)| player)
                .collect();
            if let [leader] = leaders.as_slice() {
                self.holder = Some(*leader);
            }
        }

        (self.holder != previous).then_some(HolderChange {
            previous,
            holder: self.holder,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::board::{BoardLayout, BoardVariant, Building};

    fn board() -> Board {
        Board::from_layout(BoardVariant::Standard, &BoardLayout::standard())
    }

    /// Vertex path of `edges` roads starting at `start`, never revisiting a vertex.
    fn walk(board: &Board, start: VertexId, edges: usize) -> Vec<VertexId> {
        walk_avoiding(board, start, edges, &[])
    }

    fn walk_avoiding(
        board: &Board,
        start: VertexId,
        edges: usize,
        avoid: &[VertexId],
    ) -> Vec<VertexId> {
        let mut path = vec![start];
        let mut seen: HashSet<VertexId> = avoid.iter().copied().collect();
        seen.insert(start);
        while path.len() <= edges {
            let current = *path.last().unwrap();
            let next = board
                .vertex(current)
                .unwrap()
                .neighbors
                .iter()
                .copied()
                .filter(|n| board.vertex(*n).unwrap().on_land && !seen.contains(n))
                .min()
                .expect("walk got stuck");
            seen.insert(next);
            path.push(next);
        }
        path
    }

    fn lay_roads(
        board: &mut Board,
        calc: &mut LongestRoadCalculator,
        player: PlayerId,
        path: &[VertexId],
    ) {
        for pair in path.windows(2) {
            let edge = board.edge_between(pair[0], pair[1]).unwrap();
            board.edges[edge as usize].occupant = Some(player);
            calc.on_ownership_change(board, OwnershipChange::Road { edge, player });
        }
    }

    fn settle(
        board: &mut Board,
        calc: &mut LongestRoadCalculator,
        player: PlayerId,
        vertex: VertexId,
    ) {
        board.vertices[vertex as usize].building = Some(Building {
            owner: player,
            level: BuildingLevel::Settlement,
        });
        calc.on_ownership_change(
            board,
            OwnershipChange::Building {
                vertex,
                player,
                level: BuildingLevel::Settlement,
            },
        );
    }

    #[test]
    fn straight_path_counts_every_edge() {
        for n in 1..=8 {
            let mut board = board();
            let mut calc = LongestRoadCalculator::new(2);
            let start = board.tile(0).unwrap().vertices[0];
            let path = walk(&board, start, n);
            lay_roads(&mut board, &mut calc, 0, &path);
            assert_eq!(calc.length_of(0) as usize, n);
        }
    }

    #[test]
    fn opposing_settlement_splits_path() {
        let mut board = board();
        let mut calc = LongestRoadCalculator::new(2);
        let start = board.tile(0).unwrap().vertices[0];
        let path = walk(&board, start, 7);
        lay_roads(&mut board, &mut calc, 0, &path);
        assert_eq!(calc.length_of(0), 7);
        assert_eq!(calc.holder(), Some(0));

        // Splits 7 into 2 + 5.
        settle(&mut board, &mut calc, 1, path[2]);
        assert_eq!(calc.length_of(0), 5);
        assert_eq!(calc.holder(), Some(0));

        // Splits the 5 into 3 + 2; holder falls below threshold.
        let change = {
            board.vertices[path[5] as usize].building = Some(Building {
                owner: 1,
                level: BuildingLevel::Settlement,
            });
            calc.on_ownership_change(
                &board,
                OwnershipChange::Building {
                    vertex: path[5],
                    player: 1,
                    level: BuildingLevel::Settlement,
                },
            )
        };
        assert_eq!(calc.length_of(0), 3);
        assert_eq!(
            change,
            Some(HolderChange {
                previous: Some(0),
                holder: None
            })
        );
    }

    #[test]
    fn own_settlement_does_not_sever() {
        let mut board = board();
        let mut calc = LongestRoadCalculator::new(2);
        let start = board.tile(0).unwrap().vertices[0];
        let path = walk(&board, start, 4);
        lay_roads(&mut board, &mut calc, 0, &path);
        settle(&mut board, &mut calc, 0, path[2]);
        assert_eq!(calc.length_of(0), 4);
    }

    #[test]
    fn fork_counts_longest_branch_not_all_edges() {
        let mut board = board();
        let mut calc = LongestRoadCalculator::new(1);
        let start = board.tile(0).unwrap().vertices[0];
        let path = walk(&board, start, 3);
        lay_roads(&mut board, &mut calc, 0, &path);
        // A spur off the middle vertex that is not on the path.
        let spur_target = board
            .vertex(path[1])
            .unwrap()
            .neighbors
            .iter()
            .copied()
            .find(|n| *n != path[0] && *n != path[2])
            .unwrap();
        lay_roads(&mut board, &mut calc, 0, &[path[1], spur_target]);
        assert_eq!(calc.network(0).unwrap().len(), 4);
        assert_eq!(calc.length_of(0), 3);
    }

    #[test]
    fn closed_loop_counts_all_edges() {
        let mut board = board();
        let mut calc = LongestRoadCalculator::new(1);
        let ring = board.tile(0).unwrap().vertices;
        let mut path = ring.to_vec();
        path.push(ring[0]);
        lay_roads(&mut board, &mut calc, 0, &path);
        assert_eq!(calc.length_of(0), 6);
    }

    #[test]
    fn tie_does_not_move_the_flag() {
        let mut board = board();
        let mut calc = LongestRoadCalculator::new(2);
        let first = walk(&board, board.tile(0).unwrap().vertices[0], 5);
        lay_roads(&mut board, &mut calc, 0, &first);
        assert_eq!(calc.holder(), Some(0));

        let far_start = board
            .land_vertices()
            .map(|v| v.id)
            .filter(|v| !first.contains(v))
            .max()
            .unwrap();
        let second = walk_avoiding(&board, far_start, 5, &first);
        assert!(second.iter().all(|v| !first.contains(v)));
        lay_roads(&mut board, &mut calc, 1, &second);
        assert_eq!(calc.length_of(1), 5);
        assert_eq!(calc.holder(), Some(0));
    }
}
