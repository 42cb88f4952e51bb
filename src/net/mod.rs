//! Message-level network protocol
//!
//! The game core defines only the messages and what they mean: a host
//! process is responsible for moving the encoded strings between peers.
//! No framing, no retries, no sockets here.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::Replica;
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, WireVoxels, decode, encode};
pub use server::{Session, TERRAIN_CHUNK};
