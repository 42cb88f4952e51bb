use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cairn::mesh::{AtlasLayout, SurfaceMesh};
use cairn::terrain::{GridCoord, GridShape, VoxelBlock, VoxelGrid, VoxelType};

/// Deterministic rolling terrain: a column of material up to a height that
/// varies with x and z, confirmed empty above it.
fn test_terrain(shape: GridShape) -> VoxelBlock {
    let mut block = VoxelBlock::filled(shape, VoxelType::Empty);
    for x in 0..shape.x {
        for z in 0..shape.z {
            let height = 1 + (x * 7 + z * 13) % (shape.y - 1);
            for y in 0..height {
                let material = match (x + y + z) % 3 {
                    0 => VoxelType::Grass,
                    1 => VoxelType::Mountain,
                    _ => VoxelType::Desert,
                };
                block.set(x, y, z, material);
            }
        }
    }
    block
}

fn bench_bulk_mesh_32(c: &mut Criterion) {
    let block = test_terrain(GridShape::new(32, 8, 32));

    c.bench_function("bulk_mesh_32x8x32", |b| {
        b.iter(|| {
            let mut grid = VoxelGrid::new();
            let mesh = SurfaceMesh::attach(&mut grid, AtlasLayout::default());
            grid.set(GridCoord::new(0, 0, 0), black_box(&block));
            black_box(mesh.borrow().live_vertex_count())
        });
    });
}

fn bench_edit_churn(c: &mut Criterion) {
    let block = test_terrain(GridShape::new(32, 8, 32));
    let mut grid = VoxelGrid::new();
    let mesh = SurfaceMesh::attach(&mut grid, AtlasLayout::default());
    grid.set(GridCoord::new(0, 0, 0), &block);

    let target = GridCoord::new(16, 0, 16);
    let empty = VoxelBlock::single(VoxelType::Empty);
    let stone = VoxelBlock::single(VoxelType::Mountain);

    c.bench_function("edit_churn_single_voxel", |b| {
        b.iter(|| {
            grid.set(black_box(target), &empty);
            grid.set(black_box(target), &stone);
            black_box(mesh.borrow().live_vertex_count())
        });
    });
}

fn bench_grid_growth(c: &mut Criterion) {
    let seed = test_terrain(GridShape::new(8, 8, 8));

    c.bench_function("grid_growth_far_write", |b| {
        b.iter(|| {
            let mut grid = VoxelGrid::new();
            grid.set(GridCoord::new(0, 0, 0), &seed);
            grid.set(
                black_box(GridCoord::new(48, 0, 48)),
                &VoxelBlock::single(VoxelType::Grass),
            );
            black_box(grid.dims())
        });
    });
}

criterion_group!(
    benches,
    bench_bulk_mesh_32,
    bench_edit_churn,
    bench_grid_growth
);
criterion_main!(benches);
