//! Client-side replica
//!
//! Applies server messages to a local copy of the shared state: a terrain
//! grid (whose change stream drives the surface mesh) and a player table.
//! The replica trusts the server - messages about unknown players are
//! logged and skipped, never errors.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec3;

use crate::core::Clock;
use crate::net::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::terrain::{GridCoord, VoxelGrid};
use crate::world::{Player, PlayerId};

/// Local copy of the server's world, as far as this client has seen it.
pub struct Replica {
    clock: Rc<dyn Clock>,
    terrain: VoxelGrid,
    players: HashMap<PlayerId, Player>,
    own_id: Option<PlayerId>,
    granularity: Option<u32>,
}

impl Replica {
    /// Create an empty replica
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            terrain: VoxelGrid::new(),
            players: HashMap::new(),
            own_id: None,
            granularity: None,
        }
    }

    /// The replicated terrain grid
    pub fn terrain(&self) -> &VoxelGrid {
        &self.terrain
    }

    /// Mutable grid access, used to attach the surface mesh before the
    /// first terrain message arrives
    pub fn terrain_mut(&mut self) -> &mut VoxelGrid {
        &mut self.terrain
    }

    /// This client's player id, once welcomed
    pub fn own_id(&self) -> Option<PlayerId> {
        self.own_id
    }

    /// Server tick rate, once welcomed
    pub fn granularity(&self) -> Option<u32> {
        self.granularity
    }

    /// Look up a replicated player
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Number of replicated players, own player included
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The introduction request to open a connection with
    pub fn introduction() -> ClientMessage {
        ClientMessage::Introduce
    }

    /// Apply one server message to the local state.
    pub fn apply(&mut self, message: ServerMessage) -> Result<(), ProtocolError> {
        match message {
            ServerMessage::Welcome {
                identifier,
                granularity,
                speed,
                position,
            } => {
                self.own_id = Some(identifier);
                self.granularity = Some(granularity);
                self.players.insert(
                    identifier,
                    Player::new(Vec3::from_array(position), speed, self.clock.clone()),
                );
            }
            ServerMessage::NewPlayer {
                identifier,
                position,
                speed,
            } => {
                self.players.insert(
                    identifier,
                    Player::new(Vec3::from_array(position), speed, self.clock.clone()),
                );
            }
            ServerMessage::RemovePlayer { identifier } => {
                if self.players.remove(&identifier).is_none() {
                    log::warn!("server removed unknown player {identifier}");
                }
            }
            ServerMessage::SetDirectionOf {
                identifier,
                direction,
                position,
                orientation_y,
            } => match self.players.get_mut(&identifier) {
                Some(player) => {
                    player.set_position(Vec3::from_array(position));
                    player.set_orientation_y(orientation_y);
                    player.set_direction(direction.map(Vec3::from_array));
                }
                None => log::warn!("direction update for unknown player {identifier}"),
            },
            ServerMessage::YourPosition { position } => {
                if let Some(player) = self.own_id.and_then(|id| self.players.get_mut(&id)) {
                    player.set_position(Vec3::from_array(position));
                }
            }
            ServerMessage::SetTerrain { origin, voxels } => {
                let block = voxels.unpack()?;
                self.terrain
                    .set(GridCoord::new(origin[0], origin[1], origin[2]), &block);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::mesh::{AtlasLayout, SurfaceMesh};
    use crate::net::protocol::WireVoxels;
    use crate::net::server::Session;
    use crate::terrain::{VoxelBlock, VoxelType};
    use crate::world::{SpawnRegion, World};
    use std::cell::RefCell;

    fn replica() -> Replica {
        Replica::new(Rc::new(ManualClock::new(0.0)))
    }

    #[test]
    fn test_welcome_establishes_identity() {
        let mut replica = replica();
        replica
            .apply(ServerMessage::Welcome {
                identifier: 7,
                granularity: 60,
                speed: 100.0,
                position: [1.0, 0.0, 2.0],
            })
            .unwrap();

        assert_eq!(replica.own_id(), Some(7));
        assert_eq!(replica.granularity(), Some(60));
        assert_eq!(
            replica.player(7).unwrap().position(),
            Vec3::new(1.0, 0.0, 2.0)
        );
    }

    #[test]
    fn test_player_roster_follows_messages() {
        let mut replica = replica();
        replica
            .apply(ServerMessage::NewPlayer {
                identifier: 3,
                position: [0.0; 3],
                speed: 100.0,
            })
            .unwrap();
        assert_eq!(replica.player_count(), 1);

        replica
            .apply(ServerMessage::RemovePlayer { identifier: 3 })
            .unwrap();
        assert_eq!(replica.player_count(), 0);

        // Unknown removals are tolerated
        replica
            .apply(ServerMessage::RemovePlayer { identifier: 3 })
            .unwrap();
    }

    #[test]
    fn test_direction_updates_move_other_players() {
        let clock = Rc::new(ManualClock::new(0.0));
        let mut replica = Replica::new(clock.clone());
        replica
            .apply(ServerMessage::NewPlayer {
                identifier: 3,
                position: [0.0; 3],
                speed: 2.0,
            })
            .unwrap();
        replica
            .apply(ServerMessage::SetDirectionOf {
                identifier: 3,
                direction: Some([1.0, 0.0, 0.0]),
                position: [10.0, 0.0, 0.0],
                orientation_y: 90.0,
            })
            .unwrap();

        clock.advance(1.0);
        // Extrapolates from the server-supplied position
        assert_eq!(
            replica.player(3).unwrap().position(),
            Vec3::new(12.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_terrain_messages_drive_an_attached_mesh() {
        let mut replica = replica();
        let mesh = SurfaceMesh::attach(replica.terrain_mut(), AtlasLayout::default());

        let block = VoxelBlock::single(VoxelType::Mountain);
        replica
            .apply(ServerMessage::SetTerrain {
                origin: [0, 0, 0],
                voxels: WireVoxels::pack(&block),
            })
            .unwrap();

        // Replicated terrain meshes exactly like a local write would
        assert_eq!(mesh.borrow().live_vertex_count(), 36);
        assert_eq!(
            replica.terrain().get(GridCoord::new(0, 0, 0)),
            VoxelType::Mountain
        );
    }

    #[test]
    fn test_corrupt_terrain_payload_is_rejected() {
        let mut replica = replica();
        let err = replica.apply(ServerMessage::SetTerrain {
            origin: [0, 0, 0],
            voxels: WireVoxels {
                shape: [1, 1, 1],
                data: "???".into(),
            },
        });
        assert!(err.is_err());
        // The grid was not touched
        assert_eq!(
            replica.terrain().get(GridCoord::new(0, 0, 0)),
            VoxelType::Unknown
        );
    }

    #[test]
    fn test_end_to_end_session_to_replica() {
        // Server side: a world with terrain and two sessions
        let world = Rc::new(RefCell::new(World::new(
            Rc::new(ManualClock::new(0.0)),
            60,
            SpawnRegion::default(),
        )));
        world.borrow_mut().set_terrain(
            GridCoord::new(0, 0, 0),
            &VoxelBlock::single(VoxelType::Grass),
        );

        let mut session = Session::new(world.clone());
        let mut other = Session::new(world.clone());

        // Client side: a replica with a live mesh
        let mut replica = replica();
        let mesh = SurfaceMesh::attach(replica.terrain_mut(), AtlasLayout::default());

        for message in session.handle(Replica::introduction()) {
            replica.apply(message).unwrap();
        }
        assert!(replica.own_id().is_some());

        // Another player joins and the fan-out reaches our replica
        other.handle(ClientMessage::Introduce);
        for message in session.poll() {
            replica.apply(message).unwrap();
        }
        assert_eq!(replica.player_count(), 2);

        // Terrain requested over the wire meshes on arrival
        for message in session.handle(ClientMessage::GetTerrain { origin: [0, 0, 0] }) {
            replica.apply(message).unwrap();
        }
        assert_eq!(mesh.borrow().live_vertex_count(), 36);
        assert_eq!(
            replica.terrain().get(GridCoord::new(0, 0, 0)),
            VoxelType::Grass
        );
    }
}
