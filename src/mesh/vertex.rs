//! Vertex record for the terrain surface

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// One vertex of the terrain surface: position plus atlas texture coordinate.
///
/// Matches the layout the rendering collaborator uploads verbatim, so the
/// slab's live region can be handed over as raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in grid space (one voxel = one unit cube)
    pub position: Vec3,
    /// Texture coordinate into the shared atlas image
    pub uv: Vec2,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self { position, uv }
    }
}
