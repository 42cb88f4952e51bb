//! Texture atlas layout
//!
//! The renderer binds one shared atlas image for all terrain; each material
//! owns a sub-rectangle of it. The mesh builder only needs the uv origin of
//! a material's tile plus the uniform tile size - the image itself is the
//! rendering collaborator's problem.

use std::collections::HashMap;

use glam::Vec2;

use crate::terrain::VoxelType;

/// Maps each material to the uv origin of its tile in the shared atlas.
#[derive(Clone, Debug)]
pub struct AtlasLayout {
    tile_size: Vec2,
    origins: HashMap<VoxelType, Vec2>,
}

impl AtlasLayout {
    /// Create a layout from explicit tile origins
    pub fn new(tile_size: Vec2, origins: impl IntoIterator<Item = (VoxelType, Vec2)>) -> Self {
        Self {
            tile_size,
            origins: origins.into_iter().collect(),
        }
    }

    /// Size of one material tile in uv space
    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    /// The uv origin of a material's tile. Lookup is total: an unmapped
    /// material falls back to the zero tile so meshing never fails on a
    /// missing atlas entry.
    pub fn uv_origin(&self, material: VoxelType) -> Vec2 {
        self.origins.get(&material).copied().unwrap_or(Vec2::ZERO)
    }
}

impl Default for AtlasLayout {
    /// The stock 2x2 atlas: one quadrant per material.
    fn default() -> Self {
        Self::new(
            Vec2::splat(0.5),
            [
                (VoxelType::Grass, Vec2::new(0.0, 0.0)),
                (VoxelType::Mountain, Vec2::new(0.5, 0.0)),
                (VoxelType::Desert, Vec2::new(0.0, 0.5)),
                (VoxelType::Water, Vec2::new(0.5, 0.5)),
            ],
        )
    }
}
