//! Surface mesh statistics tool — meshes a map fixture and reports.
//!
//! Usage: cargo run --bin mesh_stats -- [OPTIONS]
//!
//! Options:
//!   --map <PATH>    Map fixture to load (default: assets/maps/island.map)
//!   --slab <N>      Slab capacity in vertices (default: engine default)

use std::process::ExitCode;

use cairn::mesh::{AtlasLayout, FixedSlabAllocator, SurfaceMesh, SurfaceMeshHandle};
use cairn::terrain::{GridCoord, VoxelGrid, load_voxels_from_file};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let map = parse_str_arg(&args, "--map").unwrap_or_else(|| "assets/maps/island.map".to_string());
    let slab_capacity = parse_usize_arg(&args, "--slab");

    let block = match load_voxels_from_file(&map) {
        Ok(block) => block,
        Err(err) => {
            log::error!("failed to load {map}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut grid = VoxelGrid::new();
    let mesh = match slab_capacity {
        Some(capacity) => {
            let mesh = std::rc::Rc::new(std::cell::RefCell::new(SurfaceMesh::with_allocator(
                AtlasLayout::default(),
                Box::new(FixedSlabAllocator::new(capacity)),
            )));
            grid.add_observer(Box::new(SurfaceMeshHandle::new(mesh.clone())));
            mesh
        }
        None => SurfaceMesh::attach(&mut grid, AtlasLayout::default()),
    };

    grid.set(GridCoord::new(0, 0, 0), &block);

    let mesh = mesh.borrow();
    let dims = grid.dims();
    println!("=== Cairn Mesh Stats ===");
    println!("Map:       {map}");
    println!("Grid:      {}x{}x{}", dims.x, dims.y, dims.z);
    println!("Materials: {} cells", grid.materials().len());
    println!("Faces:     {}", mesh.face_count());
    println!(
        "Vertices:  {} live ({} bytes)",
        mesh.live_vertex_count(),
        mesh.slabs().iter().map(|slab| slab.as_bytes().len()).sum::<usize>()
    );
    for (index, slab) in mesh.slabs().iter().enumerate() {
        println!(
            "Slab {index}:    {}/{} vertices ({:.1}%)",
            slab.live_count(),
            slab.capacity(),
            slab.live_count() as f32 / slab.capacity() as f32 * 100.0
        );
    }
    ExitCode::SUCCESS
}

fn parse_str_arg(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|index| args.get(index + 1).cloned())
}

fn parse_usize_arg(args: &[String], name: &str) -> Option<usize> {
    parse_str_arg(args, name).and_then(|value| value.parse().ok())
}
