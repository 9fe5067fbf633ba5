use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Slippy-map tile address. `y` grows southwards, as in XYZ tile schemes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileId {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this zoom.
    pub fn tiles_per_axis(&self) -> f32 {
        (1u64 << self.z.min(31)) as f32
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Model matrix taking tile-local coordinates (`[-1, 1]` on both axes) to flat
/// map space, where the whole map spans `[-map_size / 2, map_size / 2]` and the
/// camera pan has already been subtracted.
pub fn flat_tile_matrix(tile: TileId, map_size: f32, pan: Vec2) -> Mat4 {
    let tiles = tile.tiles_per_axis();
    let tile_size = map_size / tiles;
    let last = tiles - 1.0;
    let offset_x = tile.x as f32 * tile_size - map_size * 0.5 + tile_size * 0.5;
    let offset_y = (last - tile.y as f32) * tile_size - map_size * 0.5 + tile_size * 0.5;
    let half = tile_size * 0.5;

    Mat4::from_translation(Vec3::new(offset_x - pan.x, offset_y - pan.y, 0.0))
        * Mat4::from_scale(Vec3::new(half, half, 1.0))
}

/// Tile placement in normalized map UV (`[-1, 1]`, y up) used by the globe
/// projection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TileUv {
    pub center_x: f32,
    pub center_y: f32,
    /// Half the tile extent in UV units (`2^-z`).
    pub factor: f32,
}

pub fn tile_uv(tile: TileId) -> TileUv {
    let tiles = tile.tiles_per_axis();
    let center_tile_x = tile.x as f32 + 0.5;
    let center_tile_y = tile.y as f32 + 0.5;
    TileUv {
        center_x: -1.0 + (center_tile_x / tiles) * 2.0,
        center_y: 1.0 - (center_tile_y / tiles) * 2.0,
        factor: 1.0 / tiles,
    }
}
