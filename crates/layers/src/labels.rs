//! Screen-space label placement: place names as point labels and road names
//! laid along their polylines, with per-label fade state kept across frames.

pub mod batch;
pub mod collision;
pub mod config;
pub mod detector;
pub mod geo;
pub mod model;
pub mod road;
pub mod state;

pub use batch::EvaluationBatch;
pub use collision::{BucketGrid, CollisionAgent, SpaceIntersections};
pub use config::{ConfigError, LabelsConfig};
pub use detector::{EvaluateOutcome, PassSummary, RecallReason, ScreenCollisionsDetector};
pub use geo::{GeoLabelHandler, GeoLabelsFrame};
pub use model::{GeoLabel, Labelled, MeasuredText, RoadLabel, TileLabels};
pub use road::{LineToStartAt, RoadLabelHandler, RoadLabelsFrame, RoadTileFrame, StartRoadAt};
pub use state::{IntersectionStore, LabelIntersection, LabelIntersectionGpu};
