//! Terrain storage and fixture loading

pub mod grid;
pub mod loader;
pub mod voxel;

pub use grid::{GridCoord, GridObserver, GridShape, VoxelBlock, VoxelGrid};
pub use loader::{MapError, load_voxels_from_file, load_voxels_from_str};
pub use voxel::VoxelType;
