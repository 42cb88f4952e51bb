//! Error types for the Cairn game

use thiserror::Error;

/// Main error type for the game
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("map error: {0}")]
    Map(#[from] crate::terrain::MapError),

    #[error("mesh error: {0}")]
    Mesh(#[from] crate::mesh::MeshError),

    #[error("protocol error: {0}")]
    Protocol(#[from] crate::net::ProtocolError),
}
