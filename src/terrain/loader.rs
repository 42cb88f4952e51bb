//! Terrain fixture loader
//!
//! Parses the textual grid notation used by map fixtures: one character per
//! cell with x varying fastest along a line, lines stacking along z, and
//! blank-line-separated groups stacking along y with the top-most layer
//! written first.
//!
//! ```text
//! GGM      <- top layer (highest y)
//! GGM
//!
//! MMM      <- ground layer
//! MMM
//! ```

use std::path::Path;

use thiserror::Error;

use crate::core::Error;
use crate::terrain::grid::{GridShape, VoxelBlock};
use crate::terrain::voxel::VoxelType;

/// Fixture parse failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown tile character {character:?} in layer {layer}, row {row}")]
    UnknownTile {
        character: char,
        layer: usize,
        row: usize,
    },

    #[error("row {row} of layer {layer} is {found} cells wide, expected {expected}")]
    RaggedRow {
        layer: usize,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("layer {layer} has {found} rows, expected {expected}")]
    RaggedLayer {
        layer: usize,
        found: usize,
        expected: usize,
    },

    #[error("map is empty")]
    EmptyMap,
}

fn tile(character: char, layer: usize, row: usize) -> Result<VoxelType, MapError> {
    match character {
        '_' => Ok(VoxelType::Empty),
        'G' => Ok(VoxelType::Grass),
        'M' => Ok(VoxelType::Mountain),
        'D' => Ok(VoxelType::Desert),
        'W' => Ok(VoxelType::Water),
        _ => Err(MapError::UnknownTile {
            character,
            layer,
            row,
        }),
    }
}

/// Parse the textual grid notation into a voxel block.
///
/// Every cell in the result is confirmed (Empty or a material); fixtures
/// cannot express Unknown.
pub fn load_voxels_from_str(map: &str) -> Result<VoxelBlock, MapError> {
    let layers: Vec<Vec<&str>> = map
        .trim()
        .split("\n\n")
        .map(|layer| layer.lines().collect())
        .collect();

    let rows = layers[0].len();
    let columns = layers[0].first().map_or(0, |line| line.chars().count());
    if columns == 0 {
        return Err(MapError::EmptyMap);
    }

    let shape = GridShape::new(columns, layers.len(), rows);
    let mut block = VoxelBlock::filled(shape, VoxelType::Empty);

    for (layer_index, layer) in layers.iter().enumerate() {
        if layer.len() != rows {
            return Err(MapError::RaggedLayer {
                layer: layer_index,
                found: layer.len(),
                expected: rows,
            });
        }
        for (row_index, line) in layer.iter().enumerate() {
            let width = line.chars().count();
            if width != columns {
                return Err(MapError::RaggedRow {
                    layer: layer_index,
                    row: row_index,
                    found: width,
                    expected: columns,
                });
            }
            for (column_index, character) in line.chars().enumerate() {
                // Layers are written top-most first, so flip onto the y axis
                let y = shape.y - layer_index - 1;
                block.set(
                    column_index,
                    y,
                    row_index,
                    tile(character, layer_index, row_index)?,
                );
            }
        }
    }

    Ok(block)
}

/// Read a fixture file and parse it.
pub fn load_voxels_from_file(path: impl AsRef<Path>) -> Result<VoxelBlock, Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(load_voxels_from_str(&text)?)
}
