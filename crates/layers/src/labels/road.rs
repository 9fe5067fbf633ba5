use std::ops::Range;
use std::sync::Arc;

use foundation::bounds::{Rect, Shape};
use foundation::ids::LabelId;
use foundation::time::{FadeWindow, Time};
use glam::Vec2;
use gpu::projection::{ProjectionMode, ScreenPoint};
use gpu::uniforms::Uniforms;
use runtime::buffering::Published;
use runtime::capacity::{CapacityExceeded, Ceiling};
use rustc_hash::FxHashSet;

use crate::labels::batch::EvaluationBatch;
use crate::labels::collision::SpaceIntersections;
use crate::labels::model::{RoadLabel, TileLabels};
use crate::labels::state::{IntersectionStore, LabelIntersection};

/// Position of the text centre along the path, as a fraction of its length.
const PLACEMENT_FACTOR: f32 = 0.5;

/// Range of a label's entries in the tile's `start_at` array.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineToStartAt {
    pub index: u32,
    pub count: u32,
}

/// One rendered instance of a road name, placed at `start_at` along its path.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StartRoadAt {
    pub start_at: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadTileFrame {
    pub labels: TileLabels<RoadLabel>,
    pub intersections: Vec<LabelIntersection>,
    pub line_to_start_at: Vec<LineToStartAt>,
    pub start_at: Vec<StartRoadAt>,
    pub max_instances: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadLabelsFrame {
    pub tiles: Vec<RoadTileFrame>,
}

/// Road part of an in-flight evaluation.
#[derive(Debug, Clone)]
pub struct RoadPass {
    tiles: Vec<(TileLabels<RoadLabel>, u32)>,
    actual_ids: Arc<FxHashSet<LabelId>>,
    points: Range<usize>,
}

impl RoadPass {
    pub fn points(&self) -> Range<usize> {
        self.points.clone()
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RoadPassResult {
    pub shown: usize,
    pub hidden: usize,
}

pub struct RoadLabelHandler {
    tiles: Vec<TileLabels<RoadLabel>>,
    actual_ids: Arc<FxHashSet<LabelId>>,
    store: IntersectionStore,
    fade: FadeWindow,
    screen_spacing: f32,
    tile_ceiling: Ceiling,
    published: Published<RoadLabelsFrame>,
}

impl RoadLabelHandler {
    pub fn new(fade: FadeWindow, screen_spacing: f32, max_road_tiles: usize, buffers_in_flight: usize) -> Self {
        Self {
            tiles: Vec::new(),
            actual_ids: Arc::default(),
            store: IntersectionStore::new(),
            fade,
            screen_spacing,
            tile_ceiling: Ceiling::new("road tiles", max_road_tiles),
            published: Published::new(buffers_in_flight),
        }
    }

    pub fn tiles(&self) -> &[TileLabels<RoadLabel>] {
        &self.tiles
    }

    pub fn actual_ids(&self) -> &FxHashSet<LabelId> {
        &self.actual_ids
    }

    pub fn store(&self) -> &IntersectionStore {
        &self.store
    }

    /// Same tile bookkeeping as geo labels: other zooms fade, empty input is ignored.
    pub fn set_road_labels(&mut self, tiles: Vec<TileLabels<RoadLabel>>, now: Time) {
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

    /// Drops expired tiles and appends every polyline point to `batch`.
    ///
    /// Fails without touching `batch` when more tiles are held than the
    /// ceiling allows.
    pub fn prepare(&mut self, batch: &mut EvaluationBatch, now: Time) -> Result<RoadPass, CapacityExceeded> {
        let fade = self.fade;
        self.tiles.retain(|t| match t.time_point {
            None => true,
            Some(started) => fade.is_running(started, now),
        });
        self.tile_ceiling.check(self.tiles.len())?;

        let start = batch.len();
        let mut tiles = Vec::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            let slot = batch.slot(tile.tile)?;
            for label in tile.labels.iter() {
                batch.extend(slot, label.polyline.iter().copied());
            }
            tiles.push((tile.clone(), slot));
        }
        Ok(RoadPass {
            tiles,
            actual_ids: Arc::clone(&self.actual_ids),
            points: start..batch.len(),
        })
    }

    /// Places road names on the projected polylines and publishes the frame.
    ///
    /// `index` may already hold obstacles; placed glyphs are added to it.
    pub fn on_points_ready(
        &mut self,
        pass: RoadPass,
        points: &[ScreenPoint],
        mode: &ProjectionMode,
        uniforms: &Uniforms,
        index: &mut SpaceIntersections,
        now: Time,
    ) -> RoadPassResult {
        let RoadPass {
            tiles, actual_ids, ..
        } = pass;

        struct Candidate<'a> {
            tile: usize,
            slot_in_tile: usize,
            transform: u32,
            label: &'a RoadLabel,
            screen: &'a [ScreenPoint],
        }

        let mut candidates = Vec::new();
        let mut offset = 0;
        for (tile_idx, (tile, transform)) in tiles.iter().enumerate() {
            for (label_idx, label) in tile.labels.iter().enumerate() {
                let end = (offset + label.polyline.len()).min(points.len());
                let start = offset.min(end);
                candidates.push(Candidate {
                    tile: tile_idx,
                    slot_in_tile: label_idx,
                    transform: *transform,
                    label,
                    screen: &points[start..end],
                });
                offset += label.polyline.len();
            }
        }
        candidates.sort_by_key(|c| c.label.sort_rank);

        let hidden = LabelIntersection::new(true, 0.0);
        let mut states: Vec<Vec<LabelIntersection>> =
            tiles.iter().map(|(t, _)| vec![hidden; t.len()]).collect();
        let mut fitted: Vec<Vec<bool>> = tiles.iter().map(|(t, _)| vec![false; t.len()]).collect();
        let mut handled: FxHashSet<LabelId> = FxHashSet::default();

        for c in &candidates {
            let id = c.label.id;
            let placement = curve_placement(
                c.label,
                c.screen,
                mode,
                uniforms,
                c.transform,
                self.screen_spacing,
            );
            fitted[c.tile][c.slot_in_tile] = placement.is_some();

            let state = if !actual_ids.contains(&id) {
                self.store.force_hidden(id, now)
            } else if !handled.insert(id) {
                self.store.get(id).unwrap_or(hidden)
            } else {
                let placed = placement.is_some_and(|glyphs| index.add_as_single(&glyphs));
                self.store.resolve(id, !placed, now)
            };
            states[c.tile][c.slot_in_tile] = state;
        }

        let mut result = RoadPassResult::default();
        let mut frames = Vec::with_capacity(tiles.len());
        for (((labels, _), intersections), fitted) in tiles.into_iter().zip(states).zip(fitted) {
            let mut line_to_start_at = Vec::with_capacity(labels.len());
            let mut start_at = Vec::new();
            let mut max_instances = 0;
            for (state, fits) in intersections.iter().zip(&fitted) {
                if state.hide {
                    result.hidden += 1;
                } else {
                    result.shown += 1;
                }
                let count = u32::from(*fits);
                line_to_start_at.push(LineToStartAt {
                    index: start_at.len() as u32,
                    count,
                });
                if *fits {
                    start_at.push(StartRoadAt {
                        start_at: PLACEMENT_FACTOR,
                    });
                }
                max_instances = max_instances.max(count);
            }
            frames.push(RoadTileFrame {
                labels,
                intersections,
                line_to_start_at,
                start_at,
                max_instances,
            });
        }

        let live: FxHashSet<LabelId> = self.tiles.iter().flat_map(|t| t.ids()).collect();
        self.store.retain_ids(&live);

        self.published.publish(RoadLabelsFrame { tiles: frames });
        result
    }

    pub fn take_frame(&mut self) -> Option<&RoadLabelsFrame> {
        self.published.take()
    }

    pub fn latest_frame(&self) -> Option<&RoadLabelsFrame> {
        self.published.latest()
    }
}

/// Glyph boxes for `label` centred at the middle of its path, or `None` when
/// the text does not fit on the visible part of the projected polyline.
fn curve_placement(
    label: &RoadLabel,
    screen: &[ScreenPoint],
    mode: &ProjectionMode,
    uniforms: &Uniforms,
    transform: u32,
    spacing: f32,
) -> Option<Vec<Shape>> {
    let world = &label.polyline;
    let n = world.len();
    if n < 2 || screen.len() != n {
        return None;
    }
    if screen.iter().any(|p| !p.visible) || !(label.path_len > 0.0) {
        return None;
    }

    let screen_path_len: f32 = screen
        .windows(2)
        .map(|w| w[0].position.distance(w[1].position))
        .sum();
    let text_width = label.measured.width * label.scale + spacing;

    // Walk to the segment holding the world midpoint; the last segment takes any remainder.
    let mut remaining = label.path_len * PLACEMENT_FACTOR;
    let mut screen_so_far = 0.0;
    let mut text_start = None;
    let mut text_center = Vec2::ZERO;
    for i in 0..n - 1 {
        let (current, next) = (world[i], world[i + 1]);
        let len = current.distance(next);
        let screen_current = screen[i].position;

        if remaining - len < 0.0 || i == n - 2 {
            let direction = (next - current).try_normalize()?;
            let center = mode.project_local(uniforms, transform, current + direction * remaining);
            if !center.visible {
                return None;
            }
            text_center = center.position;
            text_start = Some(screen_so_far + text_center.distance(screen_current) - text_width * 0.5);
            break;
        }
        remaining -= len;
        screen_so_far += screen_current.distance(screen[i + 1].position);
    }
    let text_start = text_start?;

    if text_start < 0.0 || text_start + text_width > screen_path_len {
        return None;
    }
    let viewport = uniforms.viewport;
    if text_center.x + text_width < 0.0
        || text_center.y + text_width < 0.0
        || text_center.x - text_width > viewport.x
        || text_center.y - text_width > viewport.y
    {
        return None;
    }

    let mut glyphs = Vec::with_capacity(label.glyph_shifts.len());
    for shift in &label.glyph_shifts {
        let mut along = text_start + shift * label.scale;
        for w in screen.windows(2) {
            let (a, b) = (w[0].position, w[1].position);
            let len = a.distance(b);
            if along - len < 0.0 {
                let direction = (b - a).try_normalize()?;
                let at = a + direction * along;
                glyphs.push(Shape::Rect(Rect::from_center(at, label.scale, label.scale)));
                break;
            }
            along -= len;
        }
    }
    Some(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::model::MeasuredText;
    use foundation::tile::TileId;
    use glam::Mat4;
    use gpu::projection::FlatProjection;
    use gpu::uniforms::MapView;
    use pretty_assertions::assert_eq;

    /// Tile-local units map 1:1 to pixels on a 1000x1000 viewport.
    fn pixel_space() -> (ProjectionMode, Uniforms) {
        let mode = ProjectionMode::Flat(FlatProjection {
            matrices: vec![Mat4::IDENTITY],
        });
        let projection = Mat4::orthographic_rh(0.0, 1000.0, 0.0, 1000.0, -1.0, 1.0);
        let uniforms = Uniforms::new(projection, Mat4::IDENTITY, Vec2::new(1000.0, 1000.0), Time::ZERO);
        (mode, uniforms)
    }

    fn road(id: u64, rank: u16, polyline: Vec<Vec2>, width: f32, glyphs: usize) -> RoadLabel {
        let path_len = polyline.windows(2).map(|w| w[0].distance(w[1])).sum();
        RoadLabel {
            id: LabelId(id),
            polyline,
            path_len,
            glyph_shifts: (0..glyphs).map(|g| g as f32 * 10.0).collect(),
            measured: MeasuredText::new(width, 8.0, -2.0),
            scale: 1.0,
            sort_rank: rank,
        }
    }

    fn straight(y: f32) -> Vec<Vec2> {
        vec![Vec2::new(100.0, y), Vec2::new(300.0, y), Vec2::new(500.0, y)]
    }

    fn project(label: &RoadLabel) -> Vec<ScreenPoint> {
        let (mode, uniforms) = pixel_space();
        label
            .polyline
            .iter()
            .map(|p| mode.project_local(&uniforms, 0, *p))
            .collect()
    }

    fn handler() -> RoadLabelHandler {
        RoadLabelHandler::new(FadeWindow::new(0.5), 4.0, 8, 3)
    }

    fn batch() -> EvaluationBatch {
        EvaluationBatch::new(
            MapView::Flat {
                map_size: 1000.0,
                pan: Vec2::ZERO,
            },
            8,
        )
    }

    fn run(h: &mut RoadLabelHandler, points: &[ScreenPoint], index: &mut SpaceIntersections, now: Time) -> RoadPassResult {
        let (mode, uniforms) = pixel_space();
        let pass = h.prepare(&mut batch(), now).unwrap();
        assert_eq!(pass.points().len(), points.len());
        h.on_points_ready(pass, points, &mode, &uniforms, index, now)
    }

    #[test]
    fn places_glyphs_around_the_midpoint() {
        let (mode, uniforms) = pixel_space();
        let label = road(1, 0, straight(200.0), 36.0, 4);
        let glyphs = curve_placement(&label, &project(&label), &mode, &uniforms, 0, 4.0).unwrap();

        // Midpoint is x = 300; text width 40 starts at x = 280.
        let centers: Vec<f32> = glyphs
            .iter()
            .map(|g| {
                let b = g.bounding_box();
                (b.l + b.r) * 0.5
            })
            .collect();
        let expected = [280.0, 290.0, 300.0, 310.0];
        assert_eq!(centers.len(), expected.len());
        for (got, want) in centers.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "glyph at {got}, expected {want}");
        }
    }

    #[test]
    fn text_longer_than_path_is_rejected() {
        let (mode, uniforms) = pixel_space();
        let label = road(1, 0, vec![Vec2::new(100.0, 200.0), Vec2::new(130.0, 200.0)], 60.0, 3);
        assert!(curve_placement(&label, &project(&label), &mode, &uniforms, 0, 4.0).is_none());
    }

    #[test]
    fn degenerate_polylines_are_rejected() {
        let (mode, uniforms) = pixel_space();
        let single = road(1, 0, vec![Vec2::new(100.0, 200.0)], 10.0, 1);
        assert!(curve_placement(&single, &project(&single), &mode, &uniforms, 0, 4.0).is_none());

        let mut zero = road(2, 0, vec![Vec2::new(100.0, 200.0), Vec2::new(100.0, 200.0)], 10.0, 1);
        zero.path_len = 0.0;
        assert!(curve_placement(&zero, &project(&zero), &mode, &uniforms, 0, 4.0).is_none());
    }

    #[test]
    fn offscreen_text_is_rejected() {
        let (mode, uniforms) = pixel_space();
        let label = road(
            1,
            0,
            vec![Vec2::new(2000.0, 200.0), Vec2::new(2400.0, 200.0)],
            20.0,
            2,
        );
        assert!(curve_placement(&label, &project(&label), &mode, &uniforms, 0, 4.0).is_none());
    }

    #[test]
    fn negative_start_hides_without_inserting() {
        let mut h = handler();
        // Midpoint sits 10px into a long path, so the text would start before it.
        let mut label = road(1, 0, vec![Vec2::new(100.0, 200.0), Vec2::new(500.0, 200.0)], 60.0, 3);
        label.path_len = 20.0;
        let points = project(&label);
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 2), vec![label])],
            Time(1.0),
        );
        let mut index = SpaceIntersections::new(200.0);
        let result = run(&mut h, &points, &mut index, Time(1.0));

        assert_eq!(result, RoadPassResult { shown: 0, hidden: 1 });
        assert!(index.is_empty());
        let frame = h.take_frame().unwrap();
        assert_eq!(
            frame.tiles[0].line_to_start_at,
            vec![LineToStartAt { index: 0, count: 0 }]
        );
        assert_eq!(frame.tiles[0].max_instances, 0);
    }

    #[test]
    fn crossing_roads_keep_the_higher_priority_name() {
        let mut h = handler();
        let low = road(1, 5, straight(300.0), 36.0, 4);
        let high = road(
            2,
            1,
            vec![Vec2::new(300.0, 100.0), Vec2::new(300.0, 300.0), Vec2::new(300.0, 500.0)],
            36.0,
            4,
        );
        let mut points = project(&low);
        points.extend(project(&high));
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 2), vec![low, high])],
            Time(1.0),
        );
        let mut index = SpaceIntersections::new(200.0);
        let result = run(&mut h, &points, &mut index, Time(1.0));
        assert_eq!(result, RoadPassResult { shown: 1, hidden: 1 });

        let frame = h.take_frame().unwrap();
        let tile = &frame.tiles[0];
        assert!(tile.intersections[0].hide);
        assert_eq!(tile.intersections[1], LabelIntersection::new(false, 1.0));
        // Both still fit their paths, so both keep an instance for fading.
        assert_eq!(
            tile.line_to_start_at,
            vec![
                LineToStartAt { index: 0, count: 1 },
                LineToStartAt { index: 1, count: 1 },
            ]
        );
        assert_eq!(tile.start_at.len(), 2);
        assert_eq!(tile.max_instances, 1);
    }

    #[test]
    fn repeated_evaluation_keeps_fade_times() {
        let mut h = handler();
        let low = road(1, 5, straight(300.0), 36.0, 4);
        let high = road(
            2,
            1,
            vec![Vec2::new(300.0, 100.0), Vec2::new(300.0, 300.0), Vec2::new(300.0, 500.0)],
            36.0,
            4,
        );
        let mut points = project(&low);
        points.extend(project(&high));
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 2), vec![low, high])],
            Time(1.0),
        );
        run(&mut h, &points, &mut SpaceIntersections::new(200.0), Time(1.0));
        let first = h.latest_frame().unwrap().tiles[0].intersections.clone();

        let result = run(&mut h, &points, &mut SpaceIntersections::new(200.0), Time(2.0));
        assert_eq!(result, RoadPassResult { shown: 1, hidden: 1 });
        assert_eq!(h.latest_frame().unwrap().tiles[0].intersections, first);
        assert_eq!(h.store().get(LabelId(1)), Some(LabelIntersection::new(true, 0.0)));
        assert_eq!(h.store().get(LabelId(2)), Some(LabelIntersection::new(false, 1.0)));
        assert_eq!(h.tiles().len(), 1);
        assert!(h.actual_ids().contains(&LabelId(2)));
    }

    #[test]
    fn seeded_obstacle_blocks_road_name() {
        let mut h = handler();
        let label = road(1, 0, straight(200.0), 36.0, 4);
        let points = project(&label);
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 2), vec![label])],
            Time(1.0),
        );
        let mut index = SpaceIntersections::new(200.0);
        index.insert(Shape::Rect(Rect::from_center(Vec2::new(300.0, 200.0), 20.0, 20.0)));
        let result = run(&mut h, &points, &mut index, Time(1.0));
        assert_eq!(result.hidden, 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn too_many_tiles_is_backpressure() {
        let mut h = RoadLabelHandler::new(FadeWindow::new(0.5), 4.0, 1, 3);
        let tiles = (0..2)
            .map(|x| TileLabels::new(TileId::new(x, 0, 2), vec![road(x as u64, 0, straight(100.0), 10.0, 1)]))
            .collect();
        h.set_road_labels(tiles, Time(0.0));
        let mut b = batch();
        let err = h.prepare(&mut b, Time(0.0)).unwrap_err();
        assert_eq!(err.resource, "road tiles");
        assert!(b.is_empty());
        assert!(h.take_frame().is_none());
    }

    #[test]
    fn stale_tile_labels_fade_out() {
        let mut h = handler();
        let label = road(1, 0, straight(200.0), 36.0, 4);
        let points = project(&label);
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 2), vec![label])],
            Time(1.0),
        );
        run(&mut h, &points, &mut SpaceIntersections::new(200.0), Time(1.0));

        let next = road(2, 0, straight(600.0), 36.0, 4);
        let mut all = project(&next);
        all.extend(points.iter().copied());
        h.set_road_labels(
            vec![TileLabels::new(TileId::new(0, 0, 3), vec![next])],
            Time(2.0),
        );
        run(&mut h, &all, &mut SpaceIntersections::new(200.0), Time(2.2));
        let frame = h.latest_frame().unwrap();
        assert_eq!(frame.tiles.len(), 2);
        assert_eq!(
            frame.tiles[1].intersections,
            vec![LabelIntersection::new(true, 2.2)]
        );
    }
}
