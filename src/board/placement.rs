use serde::{Deserialize, Serialize};

use super::{Board, Building, EdgeId, TileId, VertexId};
use crate::types::{BuildingLevel, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("vertex {0} does not exist")]
    UnknownVertex(VertexId),
    #[error("edge {0} does not exist")]
    UnknownEdge(EdgeId),
    #[error("tile {0} does not exist")]
    UnknownTile(TileId),
    #[error("spot is not next to any land tile")]
    OffShore,
    #[error("vertex {0} already occupied")]
    VertexOccupied(VertexId),
    #[error("edge {0} already occupied")]
    EdgeOccupied(EdgeId),
    #[error("cannot build adjacent to another settlement")]
    DistanceRule,
    #[error("spot is not connected to the player's network")]
    NotConnected,
    #[error("starting road must touch the settlement just placed")]
    NotAtStartingSettlement,
    #[error("vertex {0} is not one of the player's settlements")]
    NotOwnSettlement(VertexId),
    #[error("robber must move to a different land tile")]
    RobberMustMove,
}

/// Emitted by every successful board mutation; consumed by the longest road
/// calculator within the same action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipChange {
    Road {
        edge: EdgeId,
        player: PlayerId,
    },
    Building {
        vertex: VertexId,
        player: PlayerId,
        level: BuildingLevel,
    },
}

impl Board {
    pub fn validate_road(
        &self,
        edge_id: EdgeId,
        player: PlayerId,
        starting: bool,
    ) -> Result<(), PlacementError> {
        let edge = self
            .edge(edge_id)
            .ok_or(PlacementError::UnknownEdge(edge_id))?;
        if !edge.on_land {
            return Err(PlacementError::OffShore);
        }
        if edge.occupant.is_some() {
            return Err(PlacementError::EdgeOccupied(edge_id));
        }
        if starting {
            return match self.starting_anchor(player) {
                Some(anchor) if edge.touches(anchor) => Ok(()),
                _ => Err(PlacementError::NotAtStartingSettlement),
            };
        }
        let connected = edge.vertices.iter().any(|vertex_id| {
            let vertex = &self.vertices[*vertex_id as usize];
            match vertex.occupant() {
                Some(owner) => owner == player,
                None => vertex.edges.iter().any(|other| {
                    *other != edge_id && self.edges[*other as usize].occupant == Some(player)
                }),
            }
        });
        if connected {
            Ok(())
        } else {
            Err(PlacementError::NotConnected)
        }
    }

    pub fn can_place_road(&self, edge: EdgeId, player: PlayerId, starting: bool) -> bool {
        self.validate_road(edge, player, starting).is_ok()
    }

    pub fn validate_settlement(
        &self,
        vertex_id: VertexId,
        player: PlayerId,
        starting: bool,
    ) -> Result<(), PlacementError> {
        let vertex = self
            .vertex(vertex_id)
            .ok_or(PlacementError::UnknownVertex(vertex_id))?;
        if !vertex.on_land {
            return Err(PlacementError::OffShore);
        }
        if vertex.building.is_some() {
            return Err(PlacementError::VertexOccupied(vertex_id));
        }
        if vertex
            .neighbors
            .iter()
            .any(|neighbor| self.vertices[*neighbor as usize].building.is_some())
        {
            return Err(PlacementError::DistanceRule);
        }
        if !starting
            && !vertex
                .edges
                .iter()
                .any(|edge| self.edges[*edge as usize].occupant == Some(player))
        {
            return Err(PlacementError::NotConnected);
        }
        Ok(())
    }

    pub fn can_place_settlement(&self, vertex: VertexId, player: PlayerId, starting: bool) -> bool {
        self.validate_settlement(vertex, player, starting).is_ok()
    }

    pub fn validate_city(
        &self,
        vertex_id: VertexId,
        player: PlayerId,
    ) -> Result<(), PlacementError> {
        let vertex = self
            .vertex(vertex_id)
            .ok_or(PlacementError::UnknownVertex(vertex_id))?;
        match vertex.building {
            Some(Building {
                owner,
                level: BuildingLevel::Settlement,
            }) if owner == player => Ok(()),
            _ => Err(PlacementError::NotOwnSettlement(vertex_id)),
        }
    }

    pub fn can_upgrade_to_city(&self, vertex: VertexId, player: PlayerId) -> bool {
        self.validate_city(vertex, player).is_ok()
    }

    pub fn place_road(
        &mut self,
        edge: EdgeId,
        player: PlayerId,
        starting: bool,
    ) -> Result<OwnershipChange, PlacementError> {
        self.validate_road(edge, player, starting)?;
        self.edges[edge as usize].occupant = Some(player);
        if starting {
            self.starting_anchor.remove(&player);
        }
        Ok(OwnershipChange::Road { edge, player })
    }

    pub fn place_settlement(
        &mut self,
        vertex: VertexId,
        player: PlayerId,
        starting: bool,
    ) -> Result<OwnershipChange, PlacementError> {
        self.validate_settlement(vertex, player, starting)?;
        self.vertices[vertex as usize].building = Some(Building {
            owner: player,
            level: BuildingLevel::Settlement,
        });
        if starting {
            self.starting_anchor.insert(player, vertex);
        }
        Ok(OwnershipChange::Building {
            vertex,
            player,
            level: BuildingLevel::Settlement,
        })
    }

    pub fn upgrade_to_city(
        &mut self,
        vertex: VertexId,
        player: PlayerId,
    ) -> Result<OwnershipChange, PlacementError> {
        self.validate_city(vertex, player)?;
        self.vertices[vertex as usize].building = Some(Building {
            owner: player,
            level: BuildingLevel::City,
        });
        Ok(OwnershipChange::Building {
            vertex,
            player,
            level: BuildingLevel::City,
        })
    }

    pub fn validate_robber_move(&self, tile_id: TileId) -> Result<(), PlacementError> {
        let tile = self
            .tile(tile_id)
            .ok_or(PlacementError::UnknownTile(tile_id))?;
        if !tile.terrain.is_land() {
            return Err(PlacementError::OffShore);
        }
        if tile_id == self.robber {
            return Err(PlacementError::RobberMustMove);
        }
        Ok(())
    }

    pub fn move_robber(&mut self, tile: TileId) -> Result<(), PlacementError> {
        self.validate_robber_move(tile)?;
        self.tiles[self.robber as usize].robber = false;
        self.tiles[tile as usize].robber = true;
        self.robber = tile;
        Ok(())
    }

    pub fn legal_road_spots(&self, player: PlayerId, starting: bool) -> Vec<EdgeId> {
        self.land_edges()
            .filter(|edge| self.can_place_road(edge.id, player, starting))
            .map(|edge| edge.id)
            .collect()
    }

    pub fn legal_settlement_spots(&self, player: PlayerId, starting: bool) -> Vec<VertexId> {
        self.land_vertices()
            .filter(|vertex| self.can_place_settlement(vertex.id, player, starting))
            .map(|vertex| vertex.id)
            .collect()
    }
}
