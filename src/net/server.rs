//! Server session
//!
//! One [`Session`] per connected client. Requests are translated into world
//! operations; world events past the session's cursor are translated into
//! outgoing messages on [`Session::poll`]. The host process is expected to
//! alternate handle/poll on its serialized tick.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use crate::net::protocol::{ClientMessage, ServerMessage, WireVoxels};
use crate::terrain::{GridCoord, GridShape};
use crate::world::{PlayerId, World, WorldEvent};

/// Shape of one terrain chunk served per request
pub const TERRAIN_CHUNK: GridShape = GridShape::new(64, 8, 64);

/// Server-side protocol state for one client.
pub struct Session {
    world: Rc<RefCell<World>>,
    player: Option<PlayerId>,
    cursor: usize,
}

impl Session {
    /// Create a session against a shared world.
    ///
    /// The cursor starts at the current end of the event log: history from
    /// before the connection is delivered by the introduction handshake,
    /// not replayed.
    pub fn new(world: Rc<RefCell<World>>) -> Self {
        let cursor = world.borrow().event_count();
        Self {
            world,
            player: None,
            cursor,
        }
    }

    /// The player this session controls, once introduced
    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Apply one client request and produce its direct replies.
    pub fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::Introduce => self.introduce(),
            ClientMessage::SetMyDirection {
                direction,
                orientation_y,
            } => self.set_my_direction(direction, orientation_y),
            ClientMessage::GetTerrain { origin } => self.get_terrain(origin),
        }
    }

    /// Translate world events past the cursor into outgoing messages.
    pub fn poll(&mut self) -> Vec<ServerMessage> {
        let world = self.world.borrow();
        let mut out = Vec::new();
        for event in world.events_since(self.cursor) {
            match *event {
                WorldEvent::PlayerJoined(id) => {
                    if Some(id) == self.player {
                        continue;
                    }
                    // Joined-then-left within one poll window: the player is
                    // already gone, so there is nothing to announce
                    if let Some(player) = world.player(id) {
                        out.push(ServerMessage::NewPlayer {
                            identifier: id,
                            position: player.position().to_array(),
                            speed: player.speed(),
                        });
                    }
                }
                WorldEvent::PlayerLeft(id) => {
                    if Some(id) != self.player {
                        out.push(ServerMessage::RemovePlayer { identifier: id });
                    }
                }
                WorldEvent::PlayerMoved(id) => {
                    // The owning client already got its YourPosition echo
                    if Some(id) == self.player {
                        continue;
                    }
                    if let Some(player) = world.player(id) {
                        out.push(ServerMessage::SetDirectionOf {
                            identifier: id,
                            direction: player.direction().map(|direction| direction.to_array()),
                            position: player.position().to_array(),
                            orientation_y: player.orientation_y(),
                        });
                    }
                }
                WorldEvent::TerrainChanged { origin, shape } => {
                    out.push(ServerMessage::SetTerrain {
                        origin: [origin.x, origin.y, origin.z],
                        voxels: WireVoxels::pack(&world.terrain().slice(origin, shape)),
                    });
                }
            }
        }
        self.cursor = world.event_count();
        out
    }

    /// Drop this client's player from the world.
    pub fn disconnect(&mut self) {
        if let Some(id) = self.player.take() {
            self.world.borrow_mut().remove_player(id);
        }
    }

    fn introduce(&mut self) -> Vec<ServerMessage> {
        if self.player.is_some() {
            log::warn!("client introduced twice, ignoring");
            return Vec::new();
        }
        let mut world = self.world.borrow_mut();
        let id = world.create_player();
        self.player = Some(id);
        // The join event is ours; skip it when polling
        self.cursor = world.event_count();

        let player = world.player(id).expect("player was just created");
        let mut out = vec![ServerMessage::Welcome {
            identifier: id,
            granularity: world.granularity(),
            speed: player.speed(),
            position: player.position().to_array(),
        }];
        for (other_id, other) in world.players() {
            if other_id != id {
                out.push(ServerMessage::NewPlayer {
                    identifier: other_id,
                    position: other.position().to_array(),
                    speed: other.speed(),
                });
            }
        }
        out
    }

    fn set_my_direction(
        &mut self,
        direction: Option<[f32; 3]>,
        orientation_y: f32,
    ) -> Vec<ServerMessage> {
        let Some(id) = self.player else {
            log::warn!("direction change before introduction, ignoring");
            return Vec::new();
        };
        let direction = direction.map(Vec3::from_array);
        match self
            .world
            .borrow_mut()
            .set_player_direction(id, direction, orientation_y)
        {
            Some(position) => vec![ServerMessage::YourPosition {
                position: position.to_array(),
            }],
            None => Vec::new(),
        }
    }

    fn get_terrain(&mut self, origin: [i32; 3]) -> Vec<ServerMessage> {
        // Requests outside the grid's fixed corner are clamped to nothing
        if origin.iter().any(|component| *component < 0) {
            return Vec::new();
        }
        let world = self.world.borrow();
        let block = world
            .terrain()
            .slice(GridCoord::new(origin[0], origin[1], origin[2]), TERRAIN_CHUNK);
        vec![ServerMessage::SetTerrain {
            origin,
            voxels: WireVoxels::pack(&block),
        }]
    }
}
