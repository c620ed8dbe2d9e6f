use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::IntoEnumIterator;

use crate::coords::{CubeCoord, Direction, spiral};
use crate::types::{BuildingLevel, Harbor, PlayerId, Terrain};

pub mod layout;
pub mod longest_road;
pub mod placement;

pub use layout::{BoardLayout, BoardVariant};
pub use longest_road::{HolderChange, LongestRoadCalculator, RoadNetwork};
pub use placement::{OwnershipChange, PlacementError};

pub type TileId = u16;
pub type VertexId = u16;
pub type EdgeId = u16;

/// Rings around the center tile. Rings 1-2 are land, ring 3 is the coast
/// carrying harbors, rings 4-5 are open sea.
pub const TOTAL_RINGS: u32 = 5;
pub const LAND_RINGS: u32 = 2;
pub const HARBOR_RING: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    North,
    NorthEast,
    SouthEast,
    South,
    SouthWest,
    NorthWest,
}

impl Corner {
    const ALL: [Corner; 6] = [
        Corner::North,
        Corner::NorthEast,
        Corner::SouthEast,
        Corner::South,
        Corner::SouthWest,
        Corner::NorthWest,
    ];
}

/// Sides are indexed like the direction of the tile they face.
fn side_index(direction: Direction) -> usize {
    match direction {
        Direction::East => 0,
        Direction::SouthEast => 1,
        Direction::SouthWest => 2,
        Direction::West => 3,
        Direction::NorthWest => 4,
        Direction::NorthEast => 5,
    }
}

fn side_corners(direction: Direction) -> (Corner, Corner) {
    match direction {
        Direction::East => (Corner::NorthEast, Corner::SouthEast),
        Direction::SouthEast => (Corner::SouthEast, Corner::South),
        Direction::SouthWest => (Corner::South, Corner::SouthWest),
        Direction::West => (Corner::SouthWest, Corner::NorthWest),
        Direction::NorthWest => (Corner::NorthWest, Corner::North),
        Direction::NorthEast => (Corner::North, Corner::NorthEast),
    }
}

/// Corners a tile shares with its neighbor in `direction`, as
/// (own corner, neighbor's corner).
fn shared_corners(direction: Direction) -> [(Corner, Corner); 2] {
    match direction {
        Direction::East => [
            (Corner::NorthEast, Corner::NorthWest),
            (Corner::SouthEast, Corner::SouthWest),
        ],
        Direction::SouthEast => [
            (Corner::South, Corner::NorthWest),
            (Corner::SouthEast, Corner::North),
        ],
        Direction::SouthWest => [
            (Corner::South, Corner::NorthEast),
            (Corner::SouthWest, Corner::North),
        ],
        Direction::West => [
            (Corner::NorthWest, Corner::NorthEast),
            (Corner::SouthWest, Corner::SouthEast),
        ],
        Direction::NorthWest => [
            (Corner::North, Corner::SouthEast),
            (Corner::NorthWest, Corner::South),
        ],
        Direction::NorthEast => [
            (Corner::North, Corner::SouthWest),
            (Corner::NorthEast, Corner::South),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub owner: PlayerId,
    pub level: BuildingLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub coord: CubeCoord,
    pub terrain: Terrain,
    pub number: Option<u8>,
    pub robber: bool,
    pub vertices: [VertexId; 6],
    pub edges: [EdgeId; 6],
    pub neighbors: SmallVec<[TileId; 6]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub building: Option<Building>,
    pub harbor: Option<Harbor>,
    pub edges: SmallVec<[EdgeId; 3]>,
    pub neighbors: SmallVec<[VertexId; 3]>,
    pub tiles: SmallVec<[TileId; 3]>,
    pub on_land: bool,
}

impl Vertex {
    pub fn occupant(&self) -> Option<PlayerId> {
        self.building.map(|building| building.owner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub occupant: Option<PlayerId>,
    pub vertices: [VertexId; 2],
    pub tiles: SmallVec<[TileId; 2]>,
    pub on_land: bool,
}

impl Edge {
    pub fn other_end(&self, vertex: VertexId) -> VertexId {
        if self.vertices[0] == vertex {
            self.vertices[1]
        } else {
            self.vertices[0]
        }
    }

    pub fn touches(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }
}

/// Hex board as three flat arenas (tiles, vertices, edges) linked by ids.
/// Cloning it is a plain value copy.
#[derive(Debug, Clone)]
pub struct Board {
    variant: BoardVariant,
    tiles: Vec<Tile>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    robber: TileId,
    starting_anchor: HashMap<PlayerId, VertexId>,
}

impl Board {
    pub fn generate(variant: BoardVariant) -> Self {
        let mut rng = rand::thread_rng();
        Self::generate_with_rng(variant, &mut rng)
    }

    pub fn generate_with_rng(variant: BoardVariant, rng: &mut impl rand::Rng) -> Self {
        let layout = BoardLayout::for_variant(variant, rng);
        Self::from_layout(variant, &layout)
    }

    pub fn from_layout(variant: BoardVariant, layout: &BoardLayout) -> Self {
        let coords = spiral(TOTAL_RINGS);
        let mut coord_index: HashMap<CubeCoord, TileId> = HashMap::new();
        let mut corner_ids: Vec<[VertexId; 6]> = Vec::with_capacity(coords.len());
        let mut side_ids: Vec<[EdgeId; 6]> = Vec::with_capacity(coords.len());
        let mut edge_ends: Vec<[VertexId; 2]> = Vec::new();
        let mut next_vertex: VertexId = 0;

        for (idx, coord) in coords.iter().enumerate() {
            let (corners, sides) = link_tile(
                &coord_index,
                &corner_ids,
                &side_ids,
                *coord,
                &mut next_vertex,
                &mut edge_ends,
            );
            corner_ids.push(corners);
            side_ids.push(sides);
            coord_index.insert(*coord, idx as TileId);
        }

        let mut land = layout.land.iter();
        let mut harbors = layout.harbors.iter();
        let mut harbor_ring_position = 0usize;
        let mut tiles = Vec::with_capacity(coords.len());
        let mut harbor_sides: Vec<(EdgeId, Harbor)> = Vec::new();
        for (idx, coord) in coords.iter().enumerate() {
            let ring = coord.ring_index();
            let (terrain, number) = if ring <= LAND_RINGS {
                land.next().copied().unwrap_or((Terrain::Desert, None))
            } else {
                (Terrain::Water, None)
            };
            if ring == HARBOR_RING {
                if harbor_ring_position % 2 == 0 {
                    if let (Some(harbor), Some(direction)) =
                        (harbors.next(), landward_direction(*coord))
                    {
                        harbor_sides.push((side_ids[idx][side_index(direction)], *harbor));
                    }
                }
                harbor_ring_position += 1;
            }
            let neighbors = Direction::iter()
                .filter_map(|direction| coord_index.get(&coord.neighbor(direction)).copied())
                .collect();
            tiles.push(Tile {
                id: idx as TileId,
                coord: *coord,
                terrain,
                number,
                robber: false,
                vertices: corner_ids[idx],
                edges: side_ids[idx],
                neighbors,
            });
        }

        let mut vertices: Vec<Vertex> = (0..next_vertex)
            .map(|id| Vertex {
                id,
                building: None,
                harbor: None,
                edges: SmallVec::new(),
                neighbors: SmallVec::new(),
                tiles: SmallVec::new(),
                on_land: false,
            })
            .collect();
        let mut edges: Vec<Edge> = edge_ends
            .iter()
            .enumerate()
            .map(|(id, ends)| Edge {
                id: id as EdgeId,
                occupant: None,
                vertices: *ends,
                tiles: SmallVec::new(),
                on_land: false,
            })
            .collect();

        for tile in &tiles {
            let is_land = tile.terrain.is_land();
            for vertex_id in tile.vertices {
                let vertex = &mut vertices[vertex_id as usize];
                vertex.tiles.push(tile.id);
                vertex.on_land |= is_land;
            }
            for edge_id in tile.edges {
                let edge = &mut edges[edge_id as usize];
                edge.tiles.push(tile.id);
                edge.on_land |= is_land;
            }
        }
        for edge in &edges {
            let [a, b] = edge.vertices;
            vertices[a as usize].edges.push(edge.id);
            vertices[a as usize].neighbors.push(b);
            vertices[b as usize].edges.push(edge.id);
            vertices[b as usize].neighbors.push(a);
        }
        for (edge_id, harbor) in harbor_sides {
            for vertex_id in edges[edge_id as usize].vertices {
                vertices[vertex_id as usize].harbor = Some(harbor);
            }
        }

        let robber = tiles
            .iter()
            .find(|tile| tile.terrain == Terrain::Desert)
            .map(|tile| tile.id)
            .unwrap_or(0);
        tiles[robber as usize].robber = true;

        Self {
            variant,
            tiles,
            vertices,
            edges,
            robber,
            starting_anchor: HashMap::new(),
        }
    }

    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id as usize)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id as usize)
    }

    pub fn land_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|tile| tile.terrain.is_land())
    }

    pub fn land_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter().filter(|vertex| vertex.on_land)
    }

    pub fn land_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|edge| edge.on_land)
    }

    pub fn robber_tile(&self) -> TileId {
        self.robber
    }

    /// Edge joining two vertices, if they are adjacent.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.vertex(a)?
            .edges
            .iter()
            .copied()
            .find(|edge| self.edges[*edge as usize].touches(b))
    }

    /// Players owning a settlement or city on the tile's corners, in seat order.
    pub fn owners_on_tile(&self, tile: TileId) -> Vec<PlayerId> {
        let Some(tile) = self.tile(tile) else {
            return Vec::new();
        };
        let mut owners: Vec<PlayerId> = tile
            .vertices
            .iter()
            .filter_map(|vertex| self.vertices[*vertex as usize].occupant())
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Land tiles whose yield number matches `roll`, excluding the robbed tile.
    pub fn producing_tiles(&self, roll: u8) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(move |tile| {
            tile.number == Some(roll) && !tile.robber && tile.terrain.resource().is_some()
        })
    }

    pub fn harbors_of(&self, player: PlayerId) -> Vec<Harbor> {
        self.vertices
            .iter()
            .filter(|vertex| vertex.occupant() == Some(player))
            .filter_map(|vertex| vertex.harbor)
            .collect()
    }

    pub fn buildings_of(&self, player: PlayerId) -> impl Iterator<Item = (&Vertex, BuildingLevel)> {
        self.vertices.iter().filter_map(move |vertex| match vertex.building {
            Some(building) if building.owner == player => Some((vertex, building.level)),
            _ => None,
        })
    }

    pub fn roads_of(&self, player: PlayerId) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |edge| edge.occupant == Some(player))
    }

    /// Sum of dice probabilities (in 36ths) over the resource tiles at a vertex.
    pub fn vertex_pips(&self, vertex: VertexId) -> u32 {
        let Some(vertex) = self.vertex(vertex) else {
            return 0;
        };
        vertex
            .tiles
            .iter()
            .filter_map(|tile| self.tiles[*tile as usize].number)
            .map(number_pips)
            .sum()
    }

    pub(crate) fn starting_anchor(&self, player: PlayerId) -> Option<VertexId> {
        self.starting_anchor.get(&player).copied()
    }
}

/// Ways to roll `number` with two dice, out of 36.
pub fn number_pips(number: u8) -> u32 {
    match number {
        2 | 12 => 1,
        3 | 11 => 2,
        4 | 10 => 3,
        5 | 9 => 4,
        6 | 8 => 5,
        7 => 6,
        _ => 0,
    }
}

fn landward_direction(coord: CubeCoord) -> Option<Direction> {
    Direction::iter().find(|direction| coord.neighbor(*direction).ring_index() <= LAND_RINGS)
}

/// Resolve the corner and side ids of the tile at `coordinate`, reusing ids
/// of already placed neighbors and allocating the rest.
fn link_tile(
    coord_index: &HashMap<CubeCoord, TileId>,
    corner_ids: &[[VertexId; 6]],
    side_ids: &[[EdgeId; 6]],
    coordinate: CubeCoord,
    next_vertex: &mut VertexId,
    edge_ends: &mut Vec<[VertexId; 2]>,
) -> ([VertexId; 6], [EdgeId; 6]) {
    let mut corners: [Option<VertexId>; 6] = [None; 6];
    let mut sides: [Option<EdgeId>; 6] = [None; 6];

    for direction in Direction::iter() {
        let Some(&neighbor) = coord_index.get(&coordinate.neighbor(direction)) else {
            continue;
        };
        let neighbor = neighbor as usize;
        for (own, theirs) in shared_corners(direction) {
            corners[own as usize] = Some(corner_ids[neighbor][theirs as usize]);
        }
        sides[side_index(direction)] = Some(side_ids[neighbor][side_index(direction.opposite())]);
    }

    let mut resolved_corners = [0; 6];
    for corner in Corner::ALL {
        resolved_corners[corner as usize] = match corners[corner as usize] {
            Some(id) => id,
            None => {
                let id = *next_vertex;
                *next_vertex += 1;
                id
            }
        };
    }

    let mut resolved_sides = [0; 6];
    for direction in Direction::iter() {
        let idx = side_index(direction);
        resolved_sides[idx] = match sides[idx] {
            Some(id) => id,
            None => {
                let (a, b) = side_corners(direction);
                edge_ends.push([resolved_corners[a as usize], resolved_corners[b as usize]]);
                (edge_ends.len() - 1) as EdgeId
            }
        };
    }

    (resolved_corners, resolved_sides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> Board {
        Board::from_layout(BoardVariant::Standard, &BoardLayout::standard())
    }

    #[test]
    fn standard_board_has_center_and_five_rings() {
        let board = standard();
        assert_eq!(board.tiles().len(), 91);
        assert_eq!(board.land_tiles().count(), 19);
        // A hexagon of radius r has 6(r+1)^2 corners and 3(r+1)(3r+2) sides.
        assert_eq!(board.vertices().len(), 216);
        assert_eq!(board.edges().len(), 306);
        assert_eq!(board.land_vertices().count(), 54);
        assert_eq!(board.land_edges().count(), 72);
    }

    #[test]
    fn robber_starts_on_center_desert() {
        let board = standard();
        let robber = board.tile(board.robber_tile()).unwrap();
        assert_eq!(robber.terrain, Terrain::Desert);
        assert_eq!(robber.coord, CubeCoord::default());
        assert_eq!(board.tiles().iter().filter(|t| t.robber).count(), 1);
    }

    #[test]
    fn adjacency_is_symmetric_and_bounded() {
        let board = standard();
        for vertex in board.vertices() {
            assert!((2..=3).contains(&vertex.neighbors.len()));
            assert_eq!(vertex.edges.len(), vertex.neighbors.len());
            for neighbor in &vertex.neighbors {
                assert!(board.vertex(*neighbor).unwrap().neighbors.contains(&vertex.id));
            }
        }
        for edge in board.edges() {
            assert_ne!(edge.vertices[0], edge.vertices[1]);
            assert!((1..=2).contains(&edge.tiles.len()));
        }
        for tile in board.tiles() {
            assert!(tile.neighbors.len() <= 6);
        }
        assert_eq!(board.tile(0).unwrap().neighbors.len(), 6);
    }

    #[test]
    fn nine_harbors_cover_eighteen_land_vertices() {
        let board = standard();
        let harbor_vertices: Vec<_> = board
            .vertices()
            .iter()
            .filter(|vertex| vertex.harbor.is_some())
            .collect();
        assert_eq!(harbor_vertices.len(), 18);
        assert!(harbor_vertices.iter().all(|vertex| vertex.on_land));
        let generic = harbor_vertices
            .iter()
            .filter(|vertex| vertex.harbor == Some(Harbor::Generic))
            .count();
        assert_eq!(generic, 8);
    }

    #[test]
    fn edge_between_finds_shared_side() {
        let board = standard();
        let edge = board.edge(0).unwrap();
        let [a, b] = edge.vertices;
        assert_eq!(board.edge_between(a, b), Some(0));
        assert_eq!(board.edge_between(b, a), Some(0));
    }
}
