//! Incremental surface extraction
//!
//! [`SurfaceMesh`] listens to grid writes and keeps the slab geometry exactly
//! equal to the set of exposed faces: every side of a material voxel that
//! borders Empty, Unknown, or out-of-range space. Updates are local to the
//! written region - the cost of a change never depends on total grid size.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::mesh::MeshError;
use crate::mesh::atlas::AtlasLayout;
use crate::mesh::face::{Direction, FACE_VERTICES, FaceKey};
use crate::mesh::slab::{DEFAULT_SLAB_CAPACITY, VertexSlab};
use crate::mesh::vertex::Vertex;
use crate::terrain::{GridCoord, GridObserver, GridShape, VoxelGrid, VoxelType};

/// Provides fresh slabs when the current one fills up.
pub trait SlabAllocator {
    /// Allocate one new, empty slab
    fn allocate(&mut self) -> VertexSlab;
}

/// Allocates uniformly sized slabs.
pub struct FixedSlabAllocator {
    capacity: usize,
}

impl FixedSlabAllocator {
    /// Allocate slabs of `capacity` vertices each
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for FixedSlabAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_SLAB_CAPACITY)
    }
}

impl SlabAllocator for FixedSlabAllocator {
    fn allocate(&mut self) -> VertexSlab {
        VertexSlab::new(self.capacity)
    }
}

/// Where a face's vertices live: slab index plus vertex offset within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceSlot {
    pub slab: usize,
    pub offset: usize,
}

/// Face-culled surface mesh, kept in sync with one voxel grid.
///
/// The face index and the slabs' live regions mirror each other exactly: a
/// face is tracked if and only if its six vertices are live in some slab.
/// The last slab is the current one - it takes all new appends; removal
/// compacts within whichever slab holds the face.
pub struct SurfaceMesh {
    atlas: AtlasLayout,
    slabs: Vec<VertexSlab>,
    faces: HashMap<FaceKey, FaceSlot>,
    allocator: Option<Box<dyn SlabAllocator>>,
}

impl SurfaceMesh {
    /// Create a mesh that grows by default-sized slabs
    pub fn new(atlas: AtlasLayout) -> Self {
        Self::with_allocator(atlas, Box::new(FixedSlabAllocator::default()))
    }

    /// Create a mesh with a custom slab allocator
    pub fn with_allocator(atlas: AtlasLayout, allocator: Box<dyn SlabAllocator>) -> Self {
        Self {
            atlas,
            slabs: Vec::new(),
            faces: HashMap::new(),
            allocator: Some(allocator),
        }
    }

    /// Create a mesh confined to one pre-allocated slab. Once `slab` fills
    /// up, further appends fail with `CapacityExceeded`.
    pub fn fixed(atlas: AtlasLayout, slab: VertexSlab) -> Self {
        Self {
            atlas,
            slabs: vec![slab],
            faces: HashMap::new(),
            allocator: None,
        }
    }

    /// Construct a shared mesh and subscribe it to `grid`'s change stream.
    ///
    /// The returned handle is the render side's view; the registered
    /// observer keeps the mesh in sync with every subsequent `set`.
    pub fn attach(grid: &mut VoxelGrid, atlas: AtlasLayout) -> Rc<RefCell<SurfaceMesh>> {
        let mesh = Rc::new(RefCell::new(SurfaceMesh::new(atlas)));
        grid.add_observer(Box::new(SurfaceMeshHandle { mesh: mesh.clone() }));
        mesh
    }

    /// Re-evaluate exposure for every voxel in the written region.
    ///
    /// Empty voxels un-mesh, material voxels mesh, Unknown voxels are left
    /// alone. The region is normally the exact shape of one grid write.
    pub fn changed(
        &mut self,
        grid: &VoxelGrid,
        origin: GridCoord,
        shape: GridShape,
    ) -> Result<(), MeshError> {
        for x in 0..shape.x {
            for y in 0..shape.y {
                for z in 0..shape.z {
                    let coord = origin.offset(x as i32, y as i32, z as i32);
                    let voxel = grid.get(coord);
                    if voxel == VoxelType::Empty {
                        self.remove_voxel(grid, coord)?;
                    } else if voxel.is_material() {
                        self.add_voxel(grid, coord)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Slabs in allocation order; the last one receives new appends
    pub fn slabs(&self) -> &[VertexSlab] {
        &self.slabs
    }

    /// Number of tracked faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Total live vertices across all slabs
    pub fn live_vertex_count(&self) -> usize {
        self.slabs.iter().map(|slab| slab.live_count()).sum()
    }

    /// Where a face's vertices currently live, if it is tracked
    pub fn face_slot(&self, key: FaceKey) -> Option<FaceSlot> {
        self.faces.get(&key).copied()
    }

    /// All tracked faces and their slots
    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, FaceSlot)> + '_ {
        self.faces.iter().map(|(key, slot)| (*key, *slot))
    }

    /// A voxel became material: mesh its exposed sides and obscure the
    /// neighbors' sides that now face it.
    fn add_voxel(&mut self, grid: &VoxelGrid, coord: GridCoord) -> Result<(), MeshError> {
        for direction in Direction::ALL {
            let neighbor = direction.neighbor(coord);
            if grid.get(neighbor).is_material() {
                // Covered side; the neighbor's face looking back at us is
                // obscured now. A batched write may have removed it already
                // under a different visit order, so absence is fine.
                self.remove_face(FaceKey::new(neighbor, direction.opposite()))?;
            } else {
                let key = FaceKey::new(coord, direction);
                if !self.faces.contains_key(&key) {
                    self.add_face(grid, key)?;
                }
            }
        }
        Ok(())
    }

    /// A voxel became empty: drop its faces and expose the neighbors'
    /// sides it was covering.
    fn remove_voxel(&mut self, grid: &VoxelGrid, coord: GridCoord) -> Result<(), MeshError> {
        for direction in Direction::ALL {
            let key = FaceKey::new(coord, direction);
            if self.faces.contains_key(&key) {
                // Our own exposed side
                self.remove_face(key)?;
            } else {
                let neighbor = direction.neighbor(coord);
                if grid.get(neighbor).is_material() {
                    let uncovered = FaceKey::new(neighbor, direction.opposite());
                    if !self.faces.contains_key(&uncovered) {
                        self.add_face(grid, uncovered)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Append one face's geometry to the current slab and index it.
    fn add_face(&mut self, grid: &VoxelGrid, key: FaceKey) -> Result<(), MeshError> {
        let vertices = self.face_vertices(grid, key);
        if self.slabs.last().map_or(true, VertexSlab::is_full) {
            self.push_slab()?;
        }
        let slab = self.slabs.len() - 1;
        // Cannot fail: the current slab was just checked or freshly allocated
        let offset = self.slabs[slab].append(&vertices, key)?;
        self.faces.insert(key, FaceSlot { slab, offset });
        Ok(())
    }

    /// Un-track a face and reclaim its vertices.
    ///
    /// If the face is the tail of its slab this is a pure watermark
    /// decrease; otherwise the tail block moves into the hole and its
    /// owner's index entry is repointed. Untracked keys are a no-op.
    fn remove_face(&mut self, key: FaceKey) -> Result<(), MeshError> {
        let Some(slot) = self.faces.remove(&key) else {
            return Ok(());
        };
        let slab = &mut self.slabs[slot.slab];

        if slot.offset + FACE_VERTICES == slab.live_count() {
            slab.shrink();
            return Ok(());
        }

        let tail_offset = slab.live_count() - FACE_VERTICES;
        let Some(tail_owner) = slab.owner_at(tail_offset) else {
            // Nothing identifies the tail block; put the popped entry back
            // and report, leaving the slab in its last consistent state.
            self.faces.insert(key, slot);
            return Err(MeshError::InvariantViolation {
                slab: slot.slab,
                offset: tail_offset,
            });
        };
        let tail = slab.face_at(tail_offset);
        slab.overwrite(slot.offset, &tail, tail_owner);
        slab.shrink();
        self.faces.insert(
            tail_owner,
            FaceSlot {
                slab: slot.slab,
                offset: slot.offset,
            },
        );
        Ok(())
    }

    /// Build a face's six vertices: direction template, translated to the
    /// voxel origin, textured from the material's atlas tile.
    fn face_vertices(&self, grid: &VoxelGrid, key: FaceKey) -> [Vertex; FACE_VERTICES] {
        let origin = Vec3::new(
            key.coord.x as f32,
            key.coord.y as f32,
            key.coord.z as f32,
        );
        let uv_origin = self.atlas.uv_origin(grid.get(key.coord));
        let tile = self.atlas.tile_size();

        let mut vertices = [Vertex::default(); FACE_VERTICES];
        for (vertex, (position, corner)) in vertices.iter_mut().zip(key.direction.template()) {
            *vertex = Vertex::new(
                origin + Vec3::from_array(*position),
                uv_origin + Vec2::from_array(*corner) * tile,
            );
        }
        vertices
    }

    /// Make a fresh slab current, or fail if no allocator is configured.
    fn push_slab(&mut self) -> Result<(), MeshError> {
        let full_capacity = self.slabs.last().map_or(0, VertexSlab::capacity);
        let Some(allocator) = self.allocator.as_mut() else {
            return Err(MeshError::CapacityExceeded {
                capacity: full_capacity,
            });
        };
        let slab = allocator.allocate();
        if slab.capacity() < FACE_VERTICES {
            // A slab that cannot hold a single face would loop forever
            return Err(MeshError::CapacityExceeded {
                capacity: slab.capacity(),
            });
        }
        log::debug!(
            "surface mesh grew to {} slabs ({} vertices each)",
            self.slabs.len() + 1,
            slab.capacity()
        );
        self.slabs.push(slab);
        Ok(())
    }

    /// Drop an owner tag inside a slab, for exercising the compaction
    /// failure path.
    #[cfg(test)]
    fn corrupt_owner(&mut self, slab: usize, offset: usize) {
        self.slabs[slab].clear_owner(offset);
    }
}

/// Grid-observer adapter for a shared [`SurfaceMesh`].
///
/// Mesh failures cannot propagate through the notification path, so they are
/// reported here: capacity exhaustion and compaction faults are logged and
/// the mesh keeps its last consistent state.
pub struct SurfaceMeshHandle {
    mesh: Rc<RefCell<SurfaceMesh>>,
}

impl SurfaceMeshHandle {
    /// Wrap a shared mesh for registration with a grid
    pub fn new(mesh: Rc<RefCell<SurfaceMesh>>) -> Self {
        Self { mesh }
    }
}

impl GridObserver for SurfaceMeshHandle {
    fn region_changed(&mut self, grid: &VoxelGrid, origin: GridCoord, shape: GridShape) {
        if let Err(err) = self.mesh.borrow_mut().changed(grid, origin, shape) {
            log::error!(
                "surface update failed for region at ({}, {}, {}): {err}",
                origin.x,
                origin.y,
                origin.z
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{VoxelBlock, VoxelType};

    fn coord(x: i32, y: i32, z: i32) -> GridCoord {
        GridCoord::new(x, y, z)
    }

    fn single(voxel: VoxelType) -> VoxelBlock {
        VoxelBlock::single(voxel)
    }

    /// Grid plus attached mesh, with every write driven through the
    /// observer path exactly as in production.
    struct Fixture {
        grid: VoxelGrid,
        mesh: Rc<RefCell<SurfaceMesh>>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut grid = VoxelGrid::new();
            let mesh = SurfaceMesh::attach(&mut grid, AtlasLayout::default());
            Self { grid, mesh }
        }

        fn set(&mut self, at: GridCoord, block: &VoxelBlock) {
            self.grid.set(at, block);
            self.check_invariants();
        }

        fn live(&self) -> usize {
            self.mesh.borrow().live_vertex_count()
        }

        /// Exposed-face count recomputed by brute force over the whole grid.
        fn exposed_faces(&self) -> usize {
            let dims = self.grid.dims();
            let mut count = 0;
            for x in 0..dims.x as i32 {
                for y in 0..dims.y as i32 {
                    for z in 0..dims.z as i32 {
                        let here = coord(x, y, z);
                        if !self.grid.get(here).is_material() {
                            continue;
                        }
                        for direction in Direction::ALL {
                            if !self.grid.get(direction.neighbor(here)).is_material() {
                                count += 1;
                            }
                        }
                    }
                }
            }
            count
        }

        /// Conservation, no-overlap, owner-tag agreement, and adjacency
        /// symmetry - checked after every write.
        fn check_invariants(&self) {
            let mesh = self.mesh.borrow();

            // Conservation against the brute-force scan
            assert_eq!(mesh.live_vertex_count(), FACE_VERTICES * self.exposed_faces());

            // Per slab: tracked ranges tile [0, live) exactly, and the owner
            // tags agree with the index
            for (slab_index, slab) in mesh.slabs().iter().enumerate() {
                let mut offsets: Vec<usize> = mesh
                    .faces()
                    .filter(|(_, slot)| slot.slab == slab_index)
                    .map(|(key, slot)| {
                        assert_eq!(slab.owner_at(slot.offset), Some(key));
                        slot.offset
                    })
                    .collect();
                offsets.sort_unstable();
                assert_eq!(offsets.len() * FACE_VERTICES, slab.live_count());
                for (position, offset) in offsets.iter().enumerate() {
                    assert_eq!(*offset, position * FACE_VERTICES);
                }
            }

            // No tracked face may point at a material neighbor
            for (key, _) in mesh.faces() {
                assert!(
                    !self.grid.get(key.direction.neighbor(key.coord)).is_material(),
                    "{key:?} points at a solid neighbor"
                );
            }
        }
    }

    #[test]
    fn test_single_voxel_shows_six_faces() {
        let mut fixture = Fixture::new();
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));

        assert_eq!(fixture.live(), 36);
        let mesh = fixture.mesh.borrow();
        assert_eq!(mesh.face_count(), 6);
        for direction in Direction::ALL {
            assert!(
                mesh.face_slot(FaceKey::new(coord(0, 0, 0), direction))
                    .is_some()
            );
        }
    }

    #[test]
    fn test_adjacent_voxels_occlude_shared_sides() {
        let mut fixture = Fixture::new();
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        fixture.set(coord(1, 0, 0), &single(VoxelType::Grass));

        // 12 faces minus the two looking at each other
        assert_eq!(fixture.live(), 60);
        let mesh = fixture.mesh.borrow();
        assert!(
            mesh.face_slot(FaceKey::new(coord(0, 0, 0), Direction::Right))
                .is_none()
        );
        assert!(
            mesh.face_slot(FaceKey::new(coord(1, 0, 0), Direction::Left))
                .is_none()
        );
    }

    #[test]
    fn test_removal_re_exposes_neighbor() {
        let mut fixture = Fixture::new();
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        fixture.set(coord(1, 0, 0), &single(VoxelType::Grass));
        fixture.set(coord(0, 0, 0), &single(VoxelType::Empty));

        assert_eq!(fixture.live(), 36);
        let mesh = fixture.mesh.borrow();
        assert_eq!(mesh.face_count(), 6);
        for direction in Direction::ALL {
            assert!(
                mesh.face_slot(FaceKey::new(coord(1, 0, 0), direction))
                    .is_some(),
                "{direction:?} missing on the surviving voxel"
            );
            assert!(
                mesh.face_slot(FaceKey::new(coord(0, 0, 0), direction))
                    .is_none(),
                "{direction:?} left over from the removed voxel"
            );
        }
    }

    #[test]
    fn test_idempotent_rewrites() {
        let mut fixture = Fixture::new();
        let block = single(VoxelType::Desert);
        fixture.set(coord(2, 0, 1), &block);

        let before: Vec<(FaceKey, FaceSlot)> = {
            let mesh = fixture.mesh.borrow();
            let mut faces: Vec<_> = mesh.faces().collect();
            faces.sort_by_key(|(_, slot)| slot.offset);
            faces
        };

        fixture.set(coord(2, 0, 1), &block);

        let mesh = fixture.mesh.borrow();
        let mut after: Vec<_> = mesh.faces().collect();
        after.sort_by_key(|(_, slot)| slot.offset);
        assert_eq!(before, after, "rewriting the same value must not move faces");
    }

    #[test]
    fn test_unknown_cells_are_not_meshed() {
        let mut fixture = Fixture::new();
        let mut block = VoxelBlock::filled(GridShape::new(3, 1, 1), VoxelType::Unknown);
        block.set(1, 0, 0, VoxelType::Grass);
        fixture.set(coord(0, 0, 0), &block);

        // Only the material cell produced geometry
        assert_eq!(fixture.live(), 36);
    }

    #[test]
    fn test_growth_keeps_mesh_consistent() {
        let mut fixture = Fixture::new();
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        // Far write forces the grid to reallocate
        fixture.set(coord(5, 5, 5), &single(VoxelType::Grass));

        assert_eq!(fixture.live(), 72);
        assert_eq!(fixture.grid.get(coord(0, 0, 0)), VoxelType::Mountain);
    }

    #[test]
    fn test_compaction_moves_tail_into_hole() {
        let mut fixture = Fixture::new();
        // Two separated voxels: removing the first leaves holes that the
        // second voxel's tail faces must fill.
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        fixture.set(coord(2, 0, 0), &single(VoxelType::Grass));
        fixture.set(coord(0, 0, 0), &single(VoxelType::Empty));

        assert_eq!(fixture.live(), 36);
        let mesh = fixture.mesh.borrow();
        for direction in Direction::ALL {
            let slot = mesh
                .face_slot(FaceKey::new(coord(2, 0, 0), direction))
                .expect("surviving face lost in compaction");
            assert!(slot.offset < 36);
        }
    }

    #[test]
    fn test_batched_writes_settle() {
        let mut fixture = Fixture::new();
        // A 3x1x3 slab of grass with a mountain in the middle, all applied
        // as one write; then carve a cross out of it.
        let mut block = VoxelBlock::filled(GridShape::new(3, 1, 3), VoxelType::Grass);
        block.set(1, 0, 1, VoxelType::Mountain);
        fixture.set(coord(0, 0, 0), &block);

        let mut carve = VoxelBlock::filled(GridShape::new(3, 1, 1), VoxelType::Empty);
        carve.set(1, 0, 0, VoxelType::Water);
        fixture.set(coord(0, 0, 1), &carve);
    }

    #[test]
    fn test_tower_exposes_column_sides() {
        let mut fixture = Fixture::new();
        let column = VoxelBlock::filled(GridShape::new(1, 4, 1), VoxelType::Mountain);
        fixture.set(coord(0, 0, 0), &column);

        // 4 stacked voxels: 4 sides each plus one top and one bottom
        assert_eq!(fixture.live(), (4 * 4 + 2) * FACE_VERTICES);
    }

    #[test]
    fn test_small_slabs_spill_into_new_ones() {
        let mut grid = VoxelGrid::new();
        let mut mesh = SurfaceMesh::with_allocator(
            AtlasLayout::default(),
            Box::new(FixedSlabAllocator::new(2 * FACE_VERTICES)),
        );
        grid.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        mesh.changed(&grid, coord(0, 0, 0), GridShape::new(1, 1, 1))
            .unwrap();

        // Six faces across two-face slabs
        assert_eq!(mesh.slabs().len(), 3);
        assert_eq!(mesh.live_vertex_count(), 36);
        for slab in mesh.slabs() {
            assert_eq!(slab.live_count(), 2 * FACE_VERTICES);
        }

        // Removal compacts within each slab and never crosses slabs
        grid.set(coord(0, 0, 0), &single(VoxelType::Empty));
        mesh.changed(&grid, coord(0, 0, 0), GridShape::new(1, 1, 1))
            .unwrap();
        assert_eq!(mesh.live_vertex_count(), 0);
        assert_eq!(mesh.slabs().len(), 3);
    }

    #[test]
    fn test_fixed_mesh_reports_capacity_exhaustion() {
        let mut grid = VoxelGrid::new();
        let mut mesh = SurfaceMesh::fixed(
            AtlasLayout::default(),
            VertexSlab::new(2 * FACE_VERTICES),
        );
        grid.set(coord(0, 0, 0), &single(VoxelType::Mountain));

        let err = mesh
            .changed(&grid, coord(0, 0, 0), GridShape::new(1, 1, 1))
            .unwrap_err();
        assert!(matches!(err, MeshError::CapacityExceeded { .. }));
        // The two faces that fit were written whole
        assert_eq!(mesh.live_vertex_count(), 2 * FACE_VERTICES);
    }

    #[test]
    fn test_compaction_fault_leaves_state_consistent() {
        let mut fixture = Fixture::new();
        fixture.set(coord(0, 0, 0), &single(VoxelType::Mountain));
        fixture.set(coord(2, 0, 0), &single(VoxelType::Grass));

        let (live_before, faces_before) = {
            let mut mesh = fixture.mesh.borrow_mut();
            let tail_offset = mesh.slabs()[0].live_count() - FACE_VERTICES;
            mesh.corrupt_owner(0, tail_offset);
            (mesh.live_vertex_count(), mesh.face_count())
        };

        // Removing the first voxel needs the corrupted tail tag
        fixture.grid.set(coord(0, 0, 0), &single(VoxelType::Empty));

        let mesh = fixture.mesh.borrow();
        // The first compaction against the corrupt tail aborts the batch;
        // nothing was half-removed.
        assert_eq!(mesh.live_vertex_count(), live_before);
        assert_eq!(mesh.face_count(), faces_before);
    }

    #[test]
    fn test_face_vertices_carry_atlas_tile() {
        let mut fixture = Fixture::new();
        fixture.set(coord(2, 3, 4), &single(VoxelType::Mountain));

        let mesh = fixture.mesh.borrow();
        let slot = mesh
            .face_slot(FaceKey::new(coord(2, 3, 4), Direction::Top))
            .unwrap();
        let slab = &mesh.slabs()[slot.slab];
        let atlas = AtlasLayout::default();
        let uv_origin = atlas.uv_origin(VoxelType::Mountain);

        for vertex in &slab.live_vertices()[slot.offset..slot.offset + FACE_VERTICES] {
            // Top face sits on the voxel's upper plane
            assert_eq!(vertex.position.y, 4.0);
            assert!(vertex.position.x >= 2.0 && vertex.position.x <= 3.0);
            assert!(vertex.position.z >= 4.0 && vertex.position.z <= 5.0);
            // Texture coordinates stay inside the material's tile
            assert!(vertex.uv.x >= uv_origin.x && vertex.uv.x <= uv_origin.x + 0.5);
            assert!(vertex.uv.y >= uv_origin.y && vertex.uv.y <= uv_origin.y + 0.5);
        }
    }

    #[test]
    fn test_zero_volume_change_is_a_no_op() {
        let mut fixture = Fixture::new();
        fixture.set(
            coord(0, 0, 0),
            &VoxelBlock::filled(GridShape::new(0, 0, 0), VoxelType::Empty),
        );
        assert_eq!(fixture.live(), 0);
    }

    #[test]
    fn test_checkerboard_churn() {
        let mut fixture = Fixture::new();
        // Fill a 4x1x4 plate, then knock out alternating cells one write at
        // a time, exercising add/remove interleaving with invariants checked
        // after every step.
        let plate = VoxelBlock::filled(GridShape::new(4, 1, 4), VoxelType::Desert);
        fixture.set(coord(0, 0, 0), &plate);
        for x in 0..4 {
            for z in 0..4 {
                if (x + z) % 2 == 0 {
                    fixture.set(coord(x, 0, z), &single(VoxelType::Empty));
                }
            }
        }
        // Survivors are fully isolated: 6 faces each
        assert_eq!(fixture.live(), 8 * 6 * FACE_VERTICES);
    }
}
