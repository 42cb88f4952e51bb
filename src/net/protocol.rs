//! Wire message types
//!
//! Messages are serde types encoded as JSON. Terrain payloads are the one
//! bulky case, so their voxel bytes travel LZ4-compressed and
//! base64-embedded rather than as JSON arrays.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::terrain::{GridShape, VoxelBlock, VoxelType};
use crate::world::PlayerId;

/// Protocol decode failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed voxel payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("voxel payload decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("byte {0} is not a voxel type")]
    BadVoxel(u8),

    #[error("voxel payload holds {actual} cells, shape needs {expected}")]
    PayloadShape { expected: usize, actual: usize },
}

/// A shaped block of voxels in transit: LZ4-compressed cell bytes,
/// base64-embedded in the JSON message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireVoxels {
    pub shape: [u32; 3],
    pub data: String,
}

impl WireVoxels {
    /// Compress a block for transit
    pub fn pack(block: &VoxelBlock) -> Self {
        let bytes: Vec<u8> = block.voxels().iter().map(|voxel| *voxel as u8).collect();
        let shape = block.shape();
        Self {
            shape: [shape.x as u32, shape.y as u32, shape.z as u32],
            data: BASE64.encode(lz4_flex::compress_prepend_size(&bytes)),
        }
    }

    /// Decompress back into a block
    pub fn unpack(&self) -> Result<VoxelBlock, ProtocolError> {
        let bytes = lz4_flex::decompress_size_prepended(&BASE64.decode(&self.data)?)?;
        let voxels = bytes
            .iter()
            .map(|byte| VoxelType::from_u8(*byte).ok_or(ProtocolError::BadVoxel(*byte)))
            .collect::<Result<Vec<_>, _>>()?;
        let shape = GridShape::new(
            self.shape[0] as usize,
            self.shape[1] as usize,
            self.shape[2] as usize,
        );
        let actual = voxels.len();
        VoxelBlock::from_voxels(shape, voxels).ok_or(ProtocolError::PayloadShape {
            expected: shape.volume(),
            actual,
        })
    }
}

/// Client-to-server requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Greeting; asks for initial model state
    Introduce,
    /// Change my player's course and heading
    SetMyDirection {
        direction: Option<[f32; 3]>,
        orientation_y: f32,
    },
    /// Request the terrain chunk anchored at `origin`
    GetTerrain { origin: [i32; 3] },
}

/// Server-to-client state updates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Introduction response: who you are and how the world ticks
    Welcome {
        identifier: PlayerId,
        granularity: u32,
        speed: f32,
        position: [f32; 3],
    },
    /// Another player exists or appeared
    NewPlayer {
        identifier: PlayerId,
        position: [f32; 3],
        speed: f32,
    },
    /// Another player disappeared
    RemovePlayer { identifier: PlayerId },
    /// Another player changed course
    SetDirectionOf {
        identifier: PlayerId,
        direction: Option<[f32; 3]>,
        position: [f32; 3],
        orientation_y: f32,
    },
    /// Authoritative echo of my own position
    YourPosition { position: [f32; 3] },
    /// A sub-grid of terrain, to write at `origin`
    SetTerrain {
        origin: [i32; 3],
        voxels: WireVoxels,
    },
}

/// Encode any message for transport
pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message off the transport
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
