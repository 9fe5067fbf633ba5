use std::sync::Arc;

use foundation::ids::LabelId;
use foundation::tile::TileId;
use foundation::time::Time;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Pre-measured text extents at scale 1. `top` is the ascent, `bottom` the
/// descent; either may be negative depending on the font's baseline origin.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasuredText {
    pub width: f32,
    pub top: f32,
    pub bottom: f32,
}

impl MeasuredText {
    pub fn new(width: f32, top: f32, bottom: f32) -> Self {
        Self { width, top, bottom }
    }

    pub fn height(&self) -> f32 {
        self.top.abs() + self.bottom.abs()
    }
}

/// Point label for a place (city, country, POI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLabel {
    pub id: LabelId,
    /// Anchor in tile-local coordinates, `[-1, 1]` on both axes.
    pub local_position: Vec2,
    pub measured: MeasuredText,
    pub scale: f32,
    /// Lower ranks win collisions.
    pub sort_rank: u16,
}

/// Road name laid out along a polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadLabel {
    pub id: LabelId,
    pub polyline: Vec<Vec2>,
    /// Polyline length in the same tile-local units.
    pub path_len: f32,
    /// Offset of each glyph from the text start, unscaled.
    pub glyph_shifts: Vec<f32>,
    pub measured: MeasuredText,
    pub scale: f32,
    pub sort_rank: u16,
}

pub trait Labelled {
    fn label_id(&self) -> LabelId;
}

impl Labelled for GeoLabel {
    fn label_id(&self) -> LabelId {
        self.id
    }
}

impl Labelled for RoadLabel {
    fn label_id(&self) -> LabelId {
        self.id
    }
}

/// Labels of one tile. The label slice is shared so a batch can be held by an
/// in-flight projection request and by published frames without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLabels<L> {
    pub tile: TileId,
    pub labels: Arc<[L]>,
    /// Set when the tile stopped being current; the tile is dropped once its
    /// fade window has passed.
    pub time_point: Option<Time>,
}

impl<L> TileLabels<L> {
    pub fn new(tile: TileId, labels: impl Into<Arc<[L]>>) -> Self {
        Self {
            tile,
            labels: labels.into(),
            time_point: None,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_stale(&self) -> bool {
        self.time_point.is_some()
    }
}

impl<L: Labelled> TileLabels<L> {
    pub fn ids(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.labels.iter().map(Labelled::label_id)
    }
}
