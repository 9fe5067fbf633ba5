use foundation::bounds::Shape;
use foundation::time::{FadeWindow, Time};
use gpu::stage::{BackendError, ProjectionBackend, ProjectionRejected, ProjectionStage};
use gpu::uniforms::CameraSnapshot;
use runtime::cadence::EvaluationCadence;
use runtime::capacity::CapacityExceeded;

use crate::labels::batch::EvaluationBatch;
use crate::labels::collision::{BucketGrid, SpaceIntersections};
use crate::labels::config::{ConfigError, LabelsConfig};
use crate::labels::geo::{GeoLabelHandler, GeoLabelsFrame, GeoPass};
use crate::labels::model::{GeoLabel, RoadLabel, TileLabels};
use crate::labels::road::{RoadLabelHandler, RoadLabelsFrame, RoadPass};

/// Why an evaluation was skipped. The next cadence tick retries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecallReason {
    Busy,
    Capacity(CapacityExceeded),
}

impl std::fmt::Display for RecallReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecallReason::Busy => write!(f, "projection in flight"),
            RecallReason::Capacity(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluateOutcome {
    /// Not on cadence, or nothing changed since the last evaluation.
    NotDue,
    /// No labels to project.
    Empty,
    Dispatched { ticket: u64, points: usize },
    RecallLater(RecallReason),
}

/// Counts from one completed evaluation.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PassSummary {
    pub geo_shown: usize,
    pub geo_hidden: usize,
    pub road_shown: usize,
    pub road_hidden: usize,
    /// Keep drawing for this long so fades can play.
    pub redraw_for: f32,
}

/// Context carried through the projection stage.
#[derive(Debug)]
pub struct PassContext {
    geo: GeoPass,
    road: RoadPass,
}

/// Drives label evaluation: collects anchors from both handlers, projects
/// them in one request and resolves collisions when the points come back.
pub struct ScreenCollisionsDetector<B: ProjectionBackend> {
    config: LabelsConfig,
    stage: ProjectionStage<B, PassContext>,
    cadence: EvaluationCadence,
    geo: GeoLabelHandler,
    road: RoadLabelHandler,
}

impl<B: ProjectionBackend> ScreenCollisionsDetector<B> {
    pub fn new(config: LabelsConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let fade = FadeWindow::new(config.fade_duration_s);
        Ok(Self {
            stage: ProjectionStage::new(backend, config.max_projection_points, config.max_transforms),
            cadence: EvaluationCadence::new(config.evaluate_every_n_ticks),
            geo: GeoLabelHandler::new(fade, config.buffers_in_flight),
            road: RoadLabelHandler::new(
                fade,
                config.road_label_screen_spacing,
                config.max_road_tiles,
                config.buffers_in_flight,
            ),
            config,
        })
    }

    pub fn geo(&self) -> &GeoLabelHandler {
        &self.geo
    }

    pub fn road(&self) -> &RoadLabelHandler {
        &self.road
    }

    /// New visible tile set. Empty lists leave the corresponding handler untouched.
    pub fn new_state(
        &mut self,
        road: Vec<TileLabels<RoadLabel>>,
        geo: Vec<TileLabels<GeoLabel>>,
        now: Time,
    ) {
        self.road.set_road_labels(road, now);
        self.geo.set_geo_labels(geo, now);
        self.cadence.request();
    }

    /// The camera moved; re-evaluate on the next cadence tick.
    pub fn camera_changed(&mut self) {
        self.cadence.request();
    }

    /// Evaluate on the very next tick.
    pub fn request_now(&mut self) {
        self.cadence.request_now();
    }

    /// One display refresh. Starts an evaluation when the cadence says so.
    pub fn tick(&mut self, camera: &CameraSnapshot, now: Time) -> EvaluateOutcome {
        if !self.cadence.tick() {
            return EvaluateOutcome::NotDue;
        }
        self.evaluate(camera, now)
    }

    /// Collects all anchors and submits one projection request.
    pub fn evaluate(&mut self, camera: &CameraSnapshot, now: Time) -> EvaluateOutcome {
        if self.stage.is_busy() {
            return self.recall_later(RecallReason::Busy);
        }

        let mut batch = EvaluationBatch::new(camera.view, self.config.max_transforms);
        let geo = match self.geo.prepare(&mut batch, now) {
            Ok(pass) => pass,
            Err(e) => return self.recall_later(RecallReason::Capacity(e)),
        };
        let road = match self.road.prepare(&mut batch, now) {
            Ok(pass) => pass,
            Err(e) => return self.recall_later(RecallReason::Capacity(e)),
        };
        if batch.is_empty() {
            return EvaluateOutcome::Empty;
        }

        let points = batch.len();
        match self.stage.submit(batch.finish(camera), PassContext { geo, road }) {
            Ok(ticket) => EvaluateOutcome::Dispatched { ticket, points },
            Err(ProjectionRejected::Empty) => EvaluateOutcome::Empty,
            Err(ProjectionRejected::Busy) => self.recall_later(RecallReason::Busy),
            Err(ProjectionRejected::TooManyPoints(e) | ProjectionRejected::TooManyTransforms(e)) => {
                self.recall_later(RecallReason::Capacity(e))
            }
        }
    }

    fn recall_later(&mut self, reason: RecallReason) -> EvaluateOutcome {
        tracing::warn!(%reason, "label evaluation deferred");
        self.cadence.request();
        EvaluateOutcome::RecallLater(reason)
    }

    /// Consumes a finished projection, if any, and publishes fresh frames.
    pub fn poll(&mut self, now: Time) -> Option<Result<PassSummary, BackendError>> {
        let projected = match self.stage.poll()? {
            Ok(projected) => projected,
            Err(error) => {
                tracing::warn!(%error, "label projection failed");
                self.cadence.request();
                return Some(Err(error));
            }
        };
        let PassContext { geo, road } = projected.context;
        let points = &projected.points;

        let mut grid = BucketGrid::new(self.config.grid_cluster_size, self.config.grid_cell_count);
        let geo_points = &points[geo.points()];
        let geo_result = self.geo.on_points_ready(geo, geo_points, &mut grid, now);

        // Road names avoid place names that are already on screen.
        let mut index = SpaceIntersections::new(self.config.glyph_cell_size);
        for rect in &geo_result.placed {
            index.insert(Shape::Rect(*rect));
        }
        let road_points = &points[road.points()];
        let road_result = self.road.on_points_ready(
            road,
            road_points,
            &projected.batch.mode,
            &projected.batch.uniforms,
            &mut index,
            now,
        );

        let summary = PassSummary {
            geo_shown: geo_result.shown,
            geo_hidden: geo_result.hidden,
            road_shown: road_result.shown,
            road_hidden: road_result.hidden,
            redraw_for: self.config.fade_duration_s,
        };
        tracing::debug!(
            geo_shown = summary.geo_shown,
            geo_hidden = summary.geo_hidden,
            road_shown = summary.road_shown,
            road_hidden = summary.road_hidden,
            points = points.len(),
            "label pass complete"
        );
        Some(Ok(summary))
    }

    /// Geo frame for the renderer's next buffer slot, if it still needs one.
    pub fn geo_labels(&mut self) -> Option<&GeoLabelsFrame> {
        self.geo.take_frame()
    }

    pub fn road_labels(&mut self) -> Option<&RoadLabelsFrame> {
        self.road.take_frame()
    }
}
