//! Growable dense voxel grid with change notification
//!
//! The grid is the authoritative terrain store on the server and the replica
//! store on the client. It anchors at the zero corner and only ever grows:
//! writing past the current bounds reallocates to the smallest box covering
//! both the old contents and the new write. Cells inside the bounds that have
//! never been written read back as [`VoxelType::Unknown`], as does any read
//! outside the bounds - reads never fail.

use std::collections::BTreeMap;

use crate::terrain::voxel::VoxelType;

/// Integer cell coordinate. Negative components are always out of bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCoord {
    /// Create a new grid coordinate
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// This coordinate displaced by the given deltas
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// Extent of a grid or block along each axis, in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridShape {
    /// Create a new shape
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }
}

/// An owned dense sub-grid, used for bulk writes, slices, and wire payloads.
///
/// Layout is x-major with z varying fastest, matching the grid itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelBlock {
    shape: GridShape,
    voxels: Vec<VoxelType>,
}

impl VoxelBlock {
    /// Create a block with every cell set to `fill`
    pub fn filled(shape: GridShape, fill: VoxelType) -> Self {
        Self {
            shape,
            voxels: vec![fill; shape.volume()],
        }
    }

    /// Create a 1x1x1 block holding a single voxel
    pub fn single(voxel: VoxelType) -> Self {
        Self::filled(GridShape::new(1, 1, 1), voxel)
    }

    /// Create a block from pre-shaped cell data.
    ///
    /// Returns `None` when the data length does not match the shape's volume.
    pub fn from_voxels(shape: GridShape, voxels: Vec<VoxelType>) -> Option<Self> {
        if voxels.len() != shape.volume() {
            return None;
        }
        Some(Self { shape, voxels })
    }

    /// Shape of this block
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Read the cell at local coordinates
    pub fn get(&self, x: usize, y: usize, z: usize) -> VoxelType {
        self.voxels[self.index(x, y, z)]
    }

    /// Write the cell at local coordinates
    pub fn set(&mut self, x: usize, y: usize, z: usize, voxel: VoxelType) {
        let index = self.index(x, y, z);
        self.voxels[index] = voxel;
    }

    /// Flat cell data, x-major with z fastest
    pub fn voxels(&self) -> &[VoxelType] {
        &self.voxels
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.shape.x && y < self.shape.y && z < self.shape.z);
        (x * self.shape.y + y) * self.shape.z + z
    }
}

/// Receives synchronous notification after every grid write.
///
/// Observers run in registration order before the triggering
/// [`VoxelGrid::set`] returns. They see the grid in its post-write state and
/// cannot re-enter `set` (the grid is borrowed shared for the duration).
pub trait GridObserver {
    /// A region of the grid was overwritten. `shape` may have zero volume.
    fn region_changed(&mut self, grid: &VoxelGrid, origin: GridCoord, shape: GridShape);
}

/// Growable dense 3D voxel array, anchored at the zero corner.
pub struct VoxelGrid {
    dims: GridShape,
    voxels: Vec<VoxelType>,
    observers: Vec<Box<dyn GridObserver>>,
}

impl VoxelGrid {
    /// Create a 1x1x1 grid holding a single Unknown cell
    pub fn new() -> Self {
        Self {
            dims: GridShape::new(1, 1, 1),
            voxels: vec![VoxelType::Unknown],
            observers: Vec::new(),
        }
    }

    /// Current bounds. Grows monotonically, never shrinks.
    pub fn dims(&self) -> GridShape {
        self.dims
    }

    /// Read one cell. Out-of-bounds reads (any axis, negative included)
    /// yield Unknown rather than an error.
    pub fn get(&self, coord: GridCoord) -> VoxelType {
        if coord.x < 0 || coord.y < 0 || coord.z < 0 {
            return VoxelType::Unknown;
        }
        let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
        if x >= self.dims.x || y >= self.dims.y || z >= self.dims.z {
            return VoxelType::Unknown;
        }
        self.voxels[(x * self.dims.y + y) * self.dims.z + z]
    }

    /// Overwrite the sub-volume at `origin` with `block`, growing the grid
    /// first if the write extends past the current bounds. New cells exposed
    /// by growth start as Unknown. Every registered observer is then told
    /// about the written region, even when it has zero volume.
    ///
    /// `origin` must be non-negative; the grid's origin corner is fixed.
    pub fn set(&mut self, origin: GridCoord, block: &VoxelBlock) {
        assert!(
            origin.x >= 0 && origin.y >= 0 && origin.z >= 0,
            "grid writes start at a non-negative origin"
        );
        let shape = block.shape();
        let (ox, oy, oz) = (origin.x as usize, origin.y as usize, origin.z as usize);

        let needed = GridShape::new(ox + shape.x, oy + shape.y, oz + shape.z);
        if needed.x > self.dims.x || needed.y > self.dims.y || needed.z > self.dims.z {
            self.grow(GridShape::new(
                self.dims.x.max(needed.x),
                self.dims.y.max(needed.y),
                self.dims.z.max(needed.z),
            ));
        }

        for x in 0..shape.x {
            for y in 0..shape.y {
                for z in 0..shape.z {
                    let index =
                        ((ox + x) * self.dims.y + (oy + y)) * self.dims.z + (oz + z);
                    self.voxels[index] = block.get(x, y, z);
                }
            }
        }

        self.notify(origin, shape);
    }

    /// Copy a region out of the grid. Cells past the bounds come back
    /// Unknown, so a slice request may safely overhang the edge.
    pub fn slice(&self, origin: GridCoord, shape: GridShape) -> VoxelBlock {
        let mut block = VoxelBlock::filled(shape, VoxelType::Unknown);
        for x in 0..shape.x {
            for y in 0..shape.y {
                for z in 0..shape.z {
                    let voxel =
                        self.get(origin.offset(x as i32, y as i32, z as i32));
                    block.set(x, y, z, voxel);
                }
            }
        }
        block
    }

    /// All material cells keyed by coordinate, in deterministic order.
    /// Empty and Unknown cells are skipped.
    pub fn materials(&self) -> BTreeMap<GridCoord, VoxelType> {
        let mut out = BTreeMap::new();
        for x in 0..self.dims.x {
            for y in 0..self.dims.y {
                for z in 0..self.dims.z {
                    let coord = GridCoord::new(x as i32, y as i32, z as i32);
                    let voxel = self.get(coord);
                    if voxel.is_material() {
                        out.insert(coord, voxel);
                    }
                }
            }
        }
        out
    }

    /// Register an observer. Notification order is registration order.
    pub fn add_observer(&mut self, observer: Box<dyn GridObserver>) {
        self.observers.push(observer);
    }

    fn grow(&mut self, new_dims: GridShape) {
        let mut voxels = vec![VoxelType::Unknown; new_dims.volume()];
        for x in 0..self.dims.x {
            for y in 0..self.dims.y {
                for z in 0..self.dims.z {
                    voxels[(x * new_dims.y + y) * new_dims.z + z] =
                        self.voxels[(x * self.dims.y + y) * self.dims.z + z];
                }
            }
        }
        self.voxels = voxels;
        self.dims = new_dims;
    }

    fn notify(&mut self, origin: GridCoord, shape: GridShape) {
        // Observers borrow the grid shared while we hold their list, so the
        // list is parked locally for the duration of the multicast.
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.region_changed(self, origin, shape);
        }
        self.observers = observers;
    }
}

impl Default for VoxelGrid {
    fn default() -> Self {
        Self::new()
    }
}
