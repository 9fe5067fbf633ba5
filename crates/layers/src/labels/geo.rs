use std::ops::Range;
use std::sync::Arc;

use foundation::bounds::Rect;
use foundation::ids::LabelId;
use foundation::time::{FadeWindow, Time};
use gpu::projection::ScreenPoint;
use runtime::buffering::Published;
use runtime::capacity::CapacityExceeded;
use rustc_hash::FxHashSet;

use crate::labels::batch::EvaluationBatch;
use crate::labels::collision::{BucketGrid, CollisionAgent};
use crate::labels::model::{GeoLabel, TileLabels};
use crate::labels::state::{IntersectionStore, LabelIntersection};

/// Geo labels with their per-label state, aligned tile by tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoLabelsFrame {
    pub tiles: Vec<TileLabels<GeoLabel>>,
    pub intersections: Vec<Vec<LabelIntersection>>,
}

/// Geo part of an in-flight evaluation.
#[derive(Debug, Clone)]
pub struct GeoPass {
    tiles: Vec<TileLabels<GeoLabel>>,
    actual_ids: Arc<FxHashSet<LabelId>>,
    points: Range<usize>,
}

impl GeoPass {
    pub fn points(&self) -> Range<usize> {
        self.points.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoPassResult {
    pub shown: usize,
    pub hidden: usize,
    /// Boxes of the labels placed this pass, in placement order.
    pub placed: Vec<Rect>,
}

pub struct GeoLabelHandler {
    tiles: Vec<TileLabels<GeoLabel>>,
    actual_ids: Arc<FxHashSet<LabelId>>,
    store: IntersectionStore,
    fade: FadeWindow,
    published: Published<GeoLabelsFrame>,
}

struct Candidate<'a> {
    /// Position in the flattened label order.
    slot: usize,
    label: &'a GeoLabel,
    point: ScreenPoint,
}

impl GeoLabelHandler {
    pub fn new(fade: FadeWindow, buffers_in_flight: usize) -> Self {
        Self {
            tiles: Vec::new(),
            actual_ids: Arc::default(),
            store: IntersectionStore::new(),
            fade,
            published: Published::new(buffers_in_flight),
        }
    }

    pub fn tiles(&self) -> &[TileLabels<GeoLabel>] {
        &self.tiles
    }

    pub fn actual_ids(&self) -> &FxHashSet<LabelId> {
        &self.actual_ids
    }

    pub fn store(&self) -> &IntersectionStore {
        &self.store
    }

    /// Replaces the current tile set.
    ///
    /// Held tiles at another zoom stay around, stamped with `now`, so their
    /// labels can fade out. An empty set is ignored.
    pub fn set_geo_labels(&mut self, tiles: Vec<TileLabels<GeoLabel>>, now: Time) {
        let Some(first) = tiles.first() else {
            return;
        };
        let current_z = first.tile.z;

        let previous = std::mem::take(&mut self.tiles);
        let fading = previous.into_iter().filter(|t| t.tile.z != current_z).map(|mut t| {
            t.time_point = Some(now);
            t
        });

        let mut fresh = tiles;
        for tile in &mut fresh {
            tile.time_point = None;
        }
        self.actual_ids = Arc::new(fresh.iter().flat_map(|t| t.ids()).collect());
        self.tiles = fresh;
        self.tiles.extend(fading);
    }

    fn drop_expired(&mut self, now: Time) {
        let fade = self.fade;
        self.tiles.retain(|t| match t.time_point {
            None => true,
            Some(started) => fade.is_running(started, now),
        });
    }

    /// Drops expired tiles and appends every anchor to `batch`.
    pub fn prepare(&mut self, batch: &mut EvaluationBatch, now: Time) -> Result<GeoPass, CapacityExceeded> {
        self.drop_expired(now);

        let start = batch.len();
        for tile in &self.tiles {
            let slot = batch.slot(tile.tile)?;
            batch.extend(slot, tile.labels.iter().map(|l| l.local_position));
        }
        Ok(GeoPass {
            tiles: self.tiles.clone(),
            actual_ids: Arc::clone(&self.actual_ids),
            points: start..batch.len(),
        })
    }

    /// Resolves collisions for a finished projection and publishes the frame.
    ///
    /// `points` are the screen positions for `pass`, in the order they were added.
    pub fn on_points_ready(
        &mut self,
        pass: GeoPass,
        points: &[ScreenPoint],
        grid: &mut BucketGrid,
        now: Time,
    ) -> GeoPassResult {
        let GeoPass {
            tiles, actual_ids, ..
        } = pass;

        let mut candidates: Vec<Candidate<'_>> = tiles
            .iter()
            .flat_map(|t| t.labels.iter())
            .zip(points.iter().copied())
            .enumerate()
            .map(|(slot, (label, point))| Candidate { slot, label, point })
            .collect();
        candidates.sort_by_key(|c| c.label.sort_rank);

        let hidden = LabelIntersection::new(true, 0.0);
        let mut states = vec![hidden; candidates.len()];
        let mut handled: FxHashSet<LabelId> = FxHashSet::default();
        let mut result = GeoPassResult::default();

        for c in &candidates {
            let id = c.label.id;
            let state = if !actual_ids.contains(&id) {
                self.store.force_hidden(id, now)
            } else if !handled.insert(id) {
                self.store.get(id).unwrap_or(hidden)
            } else if !c.point.visible {
                self.store.resolve(id, true, now)
            } else {
                let m = c.label.measured;
                let agent = CollisionAgent::new(
                    c.point.position,
                    m.width * c.label.scale,
                    m.height() * c.label.scale,
                );
                let placed = grid.add_agent(agent);
                if placed {
                    result.placed.push(agent.bounds());
                }
                self.store.resolve(id, !placed, now)
            };
            states[c.slot] = state;
        }

        for s in &states {
            if s.hide {
                result.hidden += 1;
            } else {
                result.shown += 1;
            }
        }

        let mut intersections = Vec::with_capacity(tiles.len());
        let mut rest = states.as_slice();
        for tile in &tiles {
            let (head, tail) = rest.split_at(tile.len().min(rest.len()));
            intersections.push(head.to_vec());
            rest = tail;
        }

        let live: FxHashSet<LabelId> = self.tiles.iter().flat_map(|t| t.ids()).collect();
        self.store.retain_ids(&live);

        self.published.publish(GeoLabelsFrame {
            tiles,
            intersections,
        });
        result
    }

    /// Latest frame while the renderer's slots still need it.
    pub fn take_frame(&mut self) -> Option<&GeoLabelsFrame> {
        self.published.take()
    }

    pub fn latest_frame(&self) -> Option<&GeoLabelsFrame> {
        self.published.latest()
    }
}
