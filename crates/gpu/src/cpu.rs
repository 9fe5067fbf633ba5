use crate::projection::project_all;
use crate::stage::{BackendError, Completion, ProjectionBackend, ProjectionBatch};

/// Projects on the calling thread; the completion is posted before `dispatch` returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectionBackend for CpuBackend {
    fn dispatch(&mut self, batch: &ProjectionBatch, done: Completion) -> Result<(), BackendError> {
        let points = project_all(&batch.mode, &batch.uniforms, &batch.inputs);
        done.complete(points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CpuBackend;
    use crate::projection::{FlatProjection, ProjectionInput, ProjectionMode};
    use crate::stage::{ProjectionBatch, ProjectionStage};
    use crate::uniforms::Uniforms;
    use foundation::time::Time;
    use glam::{Mat4, Vec2, Vec3};

    #[test]
    fn result_is_ready_on_next_poll() {
        let mut stage = ProjectionStage::new(CpuBackend::new(), 16, 4);
        let mode = ProjectionMode::Flat(FlatProjection {
            matrices: vec![Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0))],
        });
        let uniforms = Uniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec2::new(100.0, 50.0), Time::ZERO);
        let batch = ProjectionBatch::new(
            vec![
                ProjectionInput::new(Vec2::ZERO, 0),
                ProjectionInput::new(Vec2::new(-1.5, -1.0), 0),
            ],
            mode,
            uniforms,
        );
        stage.submit(batch, "ctx").unwrap();

        let projected = stage.poll().unwrap().unwrap();
        assert_eq!(projected.context, "ctx");
        assert_eq!(projected.points[0].position, Vec2::new(75.0, 25.0));
        assert_eq!(projected.points[1].position, Vec2::ZERO);
        assert!(projected.points.iter().all(|p| p.visible));
    }
}
