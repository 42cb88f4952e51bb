//! Incremental surface mesh generation
//!
//! Turns the voxel grid into a dense triangle-list vertex buffer and keeps it
//! exactly in sync with grid writes, one changed region at a time. No full
//! rebuilds: each voxel edit touches only its own six faces and its
//! neighbors' facing sides.

pub mod atlas;
pub mod face;
pub mod slab;
pub mod surface;
pub mod vertex;

use thiserror::Error;

pub use atlas::AtlasLayout;
pub use face::{Direction, FACE_VERTICES, FaceKey};
pub use slab::{DEFAULT_SLAB_CAPACITY, VertexSlab};
pub use surface::{FaceSlot, FixedSlabAllocator, SlabAllocator, SurfaceMesh, SurfaceMeshHandle};
pub use vertex::Vertex;

/// Surface mesh failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    /// An append ran past a slab's fixed capacity and no allocator was
    /// available to provide a fresh slab. Nothing was written.
    #[error("vertex slab is full ({capacity} vertices) and no slab allocator is configured")]
    CapacityExceeded { capacity: usize },

    /// Compaction could not identify the owner of a slab's tail block. The
    /// slab and face index are left in their last consistent state; a stale
    /// face may persist until a full rebuild.
    #[error("no owner recorded for the tail block of slab {slab} at offset {offset}")]
    InvariantViolation { slab: usize, offset: usize },
}
