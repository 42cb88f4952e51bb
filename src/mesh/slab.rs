//! Fixed-capacity vertex arena
//!
//! A slab is one GPU-upload unit: a fixed block of vertex records with a
//! live-count watermark. Everything below the watermark is valid geometry,
//! everything above it is garbage. Faces are appended at the watermark and
//! removed by moving the tail block into the hole, so the live region stays
//! dense without ever rewriting more than one face.
//!
//! Each live 6-vertex block carries an owner tag naming the face it renders.
//! The tag is what lets compaction repoint the moved face's index entry in
//! O(1) instead of reverse-matching raw vertex data.

use crate::mesh::MeshError;
use crate::mesh::face::{FACE_VERTICES, FaceKey};
use crate::mesh::vertex::Vertex;

/// Default slab capacity in vertices (16384 faces). Sized so a typical scene
/// fits one slab, keeping the render side to a single buffer upload.
pub const DEFAULT_SLAB_CAPACITY: usize = 16_384 * FACE_VERTICES;

/// Fixed-capacity arena of vertex records plus a live-count watermark.
pub struct VertexSlab {
    vertices: Vec<Vertex>,
    /// Owner tag per 6-vertex block, `None` above the watermark
    owners: Vec<Option<FaceKey>>,
    live: usize,
}

impl VertexSlab {
    /// Create a slab with room for `capacity` vertices.
    ///
    /// `capacity` must be a multiple of the face size, since the slab only
    /// ever moves whole faces.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity % FACE_VERTICES == 0,
            "slab capacity must hold whole faces"
        );
        Self {
            vertices: vec![Vertex::default(); capacity],
            owners: vec![None; capacity / FACE_VERTICES],
            live: 0,
        }
    }

    /// Total capacity in vertices
    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Number of valid vertices; indices past this are garbage
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// True when no further face fits
    pub fn is_full(&self) -> bool {
        self.live + FACE_VERTICES > self.capacity()
    }

    /// Append one face at the watermark and tag it with its owner.
    ///
    /// Returns the vertex offset the face landed at. Fails without writing
    /// anything when the slab is full.
    pub fn append(
        &mut self,
        face: &[Vertex; FACE_VERTICES],
        owner: FaceKey,
    ) -> Result<usize, MeshError> {
        if self.is_full() {
            return Err(MeshError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        let offset = self.live;
        self.vertices[offset..offset + FACE_VERTICES].copy_from_slice(face);
        self.owners[offset / FACE_VERTICES] = Some(owner);
        self.live += FACE_VERTICES;
        Ok(offset)
    }

    /// Replace the face at a live, face-aligned offset (compaction path).
    pub fn overwrite(&mut self, offset: usize, face: &[Vertex; FACE_VERTICES], owner: FaceKey) {
        debug_assert!(offset % FACE_VERTICES == 0);
        debug_assert!(offset + FACE_VERTICES <= self.live);
        self.vertices[offset..offset + FACE_VERTICES].copy_from_slice(face);
        self.owners[offset / FACE_VERTICES] = Some(owner);
    }

    /// Drop the tail face: O(1) watermark decrease plus tag clear.
    pub fn shrink(&mut self) {
        debug_assert!(self.live >= FACE_VERTICES);
        self.live -= FACE_VERTICES;
        self.owners[self.live / FACE_VERTICES] = None;
    }

    /// Copy out the face at a live offset
    pub fn face_at(&self, offset: usize) -> [Vertex; FACE_VERTICES] {
        debug_assert!(offset + FACE_VERTICES <= self.live);
        let mut face = [Vertex::default(); FACE_VERTICES];
        face.copy_from_slice(&self.vertices[offset..offset + FACE_VERTICES]);
        face
    }

    /// Owner tag of the live block at `offset`, if one was recorded
    pub fn owner_at(&self, offset: usize) -> Option<FaceKey> {
        debug_assert!(offset % FACE_VERTICES == 0);
        self.owners.get(offset / FACE_VERTICES).copied().flatten()
    }

    /// The valid geometry: everything below the watermark
    pub fn live_vertices(&self) -> &[Vertex] {
        &self.vertices[..self.live]
    }

    /// Live geometry as raw bytes, ready for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.live_vertices())
    }

    /// Drop the owner tag of a live block, simulating a corrupted slab.
    #[cfg(test)]
    pub(crate) fn clear_owner(&mut self, offset: usize) {
        self.owners[offset / FACE_VERTICES] = None;
    }
}
