use std::ops::Range;

use foundation::tile::TileId;
use glam::Vec2;
use gpu::projection::ProjectionInput;
use gpu::stage::ProjectionBatch;
use gpu::transforms::TransformTable;
use gpu::uniforms::{CameraSnapshot, MapView};
use runtime::capacity::CapacityExceeded;

/// Projection inputs collected from every handler for one evaluation.
///
/// Handlers append their points in turn and remember the index range they
/// wrote, so each can find its own results in the shared output.
#[derive(Debug, Clone)]
pub struct EvaluationBatch {
    inputs: Vec<ProjectionInput>,
    transforms: TransformTable,
}

impl EvaluationBatch {
    pub fn new(view: MapView, max_transforms: usize) -> Self {
        Self {
            inputs: Vec::new(),
            transforms: TransformTable::new(view, max_transforms),
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Transform slot for `tile`, allocated on first use.
    pub fn slot(&mut self, tile: TileId) -> Result<u32, CapacityExceeded> {
        self.transforms.slot(tile)
    }

    pub fn push(&mut self, slot: u32, local: Vec2) {
        self.inputs.push(ProjectionInput::new(local, slot));
    }

    /// Appends the points of one tile and returns the range they occupy.
    pub fn extend(&mut self, slot: u32, points: impl IntoIterator<Item = Vec2>) -> Range<usize> {
        let start = self.inputs.len();
        self.inputs
            .extend(points.into_iter().map(|p| ProjectionInput::new(p, slot)));
        start..self.inputs.len()
    }

    pub fn finish(self, camera: &CameraSnapshot) -> ProjectionBatch {
        ProjectionBatch::new(self.inputs, self.transforms.into_mode(), camera.uniforms)
    }
}

#[cfg(test)]
mod tests {
    use super::EvaluationBatch;
    use foundation::tile::TileId;
    use foundation::time::Time;
    use glam::{Mat4, Vec2};
    use gpu::uniforms::{CameraSnapshot, MapView, Uniforms};

    #[test]
    fn ranges_follow_append_order() {
        let view = MapView::Flat {
            map_size: 100.0,
            pan: Vec2::ZERO,
        };
        let mut batch = EvaluationBatch::new(view, 4);
        let a = batch.slot(TileId::new(0, 0, 1)).unwrap();
        let first = batch.extend(a, [Vec2::ZERO, Vec2::ONE]);
        let b = batch.slot(TileId::new(1, 1, 1)).unwrap();
        let second = batch.extend(b, [Vec2::ZERO]);
        assert_eq!((first, second), (0..2, 2..3));

        let camera = CameraSnapshot::new(
            Uniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec2::ONE, Time::ZERO),
            view,
        );
        let projection = batch.finish(&camera);
        assert_eq!(projection.len(), 3);
        assert_eq!(projection.inputs[2].transform, 1);
        assert_eq!(projection.mode.transform_count(), 2);
    }
}
