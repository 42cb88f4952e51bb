//! Authoritative world state
//!
//! The world owns the players and the terrain grid and records everything
//! that happens to them in an append-only event log. Server sessions each
//! keep a cursor into the log, so one state change fans out to every
//! connected client without the world knowing who is listening.

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{IVec2, Vec3};

use crate::core::Clock;
use crate::terrain::{GridCoord, GridShape, VoxelBlock, VoxelGrid};
use crate::world::player::Player;

/// Identifies a player for the lifetime of the process
pub type PlayerId = u64;

/// Movement speed handed to every new player, in units per second
pub const PLAYER_SPEED: f32 = 100.0;

/// Something observable happened to the world
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    /// A player changed direction or heading
    PlayerMoved(PlayerId),
    TerrainChanged {
        origin: GridCoord,
        shape: GridShape,
    },
}

/// Ground rectangle new players spawn in, upper corner exclusive
#[derive(Clone, Copy, Debug)]
pub struct SpawnRegion {
    pub sw: IVec2,
    pub ne: IVec2,
}

impl Default for SpawnRegion {
    fn default() -> Self {
        Self {
            sw: IVec2::new(-1, -1),
            ne: IVec2::new(200, 200),
        }
    }
}

/// All-encompassing model object for one game: players, terrain, and the
/// event log that fans state changes out to sessions.
pub struct World {
    clock: Rc<dyn Clock>,
    granularity: u32,
    spawn: SpawnRegion,
    players: BTreeMap<PlayerId, Player>,
    next_player: PlayerId,
    terrain: VoxelGrid,
    events: Vec<WorldEvent>,
}

impl World {
    /// Create an empty world. `granularity` is the simulation tick rate
    /// advertised to clients, in ticks per second.
    pub fn new(clock: Rc<dyn Clock>, granularity: u32, spawn: SpawnRegion) -> Self {
        Self {
            clock,
            granularity,
            spawn,
            players: BTreeMap::new(),
            next_player: 1,
            terrain: VoxelGrid::new(),
            events: Vec::new(),
        }
    }

    /// Simulation tick rate in ticks per second
    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Spawn a new player at a random point in the spawn rectangle.
    pub fn create_player(&mut self) -> PlayerId {
        let id = self.next_player;
        self.next_player += 1;

        let x = fastrand::i32(self.spawn.sw.x..self.spawn.ne.x);
        let z = fastrand::i32(self.spawn.sw.y..self.spawn.ne.y);
        let position = Vec3::new(x as f32, 0.0, z as f32);

        self.players
            .insert(id, Player::new(position, PLAYER_SPEED, self.clock.clone()));
        self.events.push(WorldEvent::PlayerJoined(id));
        log::info!("player {id} joined at ({x}, {z})");
        id
    }

    /// Remove a player, if present
    pub fn remove_player(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_some() {
            self.events.push(WorldEvent::PlayerLeft(id));
            log::info!("player {id} left");
        }
    }

    /// Look up one player
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// All players in id order
    pub fn players(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.players.iter().map(|(id, player)| (*id, player))
    }

    /// Change a player's course and heading. Returns the server-side
    /// position at the moment of the change, which callers echo back to
    /// the owning client.
    pub fn set_player_direction(
        &mut self,
        id: PlayerId,
        direction: Option<Vec3>,
        orientation_y: f32,
    ) -> Option<Vec3> {
        let player = self.players.get_mut(&id)?;
        player.set_orientation_y(orientation_y);
        player.set_direction(direction);
        self.events.push(WorldEvent::PlayerMoved(id));
        Some(player.position())
    }

    /// The terrain store
    pub fn terrain(&self) -> &VoxelGrid {
        &self.terrain
    }

    /// Write terrain through to the grid and log the changed region
    pub fn set_terrain(&mut self, origin: GridCoord, block: &VoxelBlock) {
        self.terrain.set(origin, block);
        self.events.push(WorldEvent::TerrainChanged {
            origin,
            shape: block.shape(),
        });
    }

    /// Events appended since `cursor`; the log itself never shrinks
    pub fn events_since(&self, cursor: usize) -> &[WorldEvent] {
        &self.events[cursor.min(self.events.len())..]
    }

    /// Current end of the event log
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
