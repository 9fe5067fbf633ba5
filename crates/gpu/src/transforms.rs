use foundation::tile::{TileId, flat_tile_matrix, tile_uv};
use glam::Mat4;
use runtime::capacity::{CapacityExceeded, Ceiling};
use rustc_hash::FxHashMap;

use crate::projection::{FlatProjection, GlobeProjection, GlobeTileParams, ProjectionMode};
use crate::uniforms::MapView;

/// Assigns one transform slot per distinct tile in a batch.
#[derive(Debug, Clone)]
pub struct TransformTable {
    view: MapView,
    slots: FxHashMap<TileId, u32>,
    matrices: Vec<Mat4>,
    globe_tiles: Vec<GlobeTileParams>,
    ceiling: Ceiling,
}

impl TransformTable {
    pub fn new(view: MapView, max_transforms: usize) -> Self {
        Self {
            view,
            slots: FxHashMap::default(),
            matrices: Vec::new(),
            globe_tiles: Vec::new(),
            ceiling: Ceiling::new("transforms", max_transforms),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot for `tile`, allocating it on first use.
    pub fn slot(&mut self, tile: TileId) -> Result<u32, CapacityExceeded> {
        if let Some(&slot) = self.slots.get(&tile) {
            return Ok(slot);
        }
        self.ceiling.check(self.slots.len() + 1)?;

        let slot = self.slots.len() as u32;
        match self.view {
            MapView::Flat { map_size, pan } => {
                self.matrices.push(flat_tile_matrix(tile, map_size, pan));
            }
            MapView::Globe(_) => {
                let uv = tile_uv(tile);
                self.globe_tiles
                    .push(GlobeTileParams::new(uv.center_x, uv.center_y, uv.factor));
            }
        }
        self.slots.insert(tile, slot);
        Ok(slot)
    }

    pub fn into_mode(self) -> ProjectionMode {
        match self.view {
            MapView::Flat { .. } => ProjectionMode::Flat(FlatProjection {
                matrices: self.matrices,
            }),
            MapView::Globe(camera) => ProjectionMode::Globe(GlobeProjection {
                camera,
                tiles: self.globe_tiles,
            }),
        }
    }
}
