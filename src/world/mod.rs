//! Server-side game model

pub mod player;
pub mod world;

pub use player::Player;
pub use world::{PLAYER_SPEED, PlayerId, SpawnRegion, World, WorldEvent};
