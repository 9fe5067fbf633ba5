use foundation::time::Time;
use glam::{Mat4, Vec2};

/// Per-frame camera state captured when an evaluation starts.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Uniforms {
    pub projection: Mat4,
    pub view: Mat4,
    /// Drawable size in pixels.
    pub viewport: Vec2,
    pub elapsed: Time,
}

impl Uniforms {
    pub fn new(projection: Mat4, view: Mat4, viewport: Vec2, elapsed: Time) -> Self {
        Self {
            projection,
            view,
            viewport,
            elapsed,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Globe camera parameters shared by every tile in a batch.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlobeCamera {
    /// Latitude at the screen centre, radians.
    pub latitude: f32,
    /// Longitude at the screen centre, radians.
    pub longitude: f32,
    pub radius: f32,
}

/// How tile-local coordinates reach world space for the current frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MapView {
    Flat { map_size: f32, pan: Vec2 },
    Globe(GlobeCamera),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraSnapshot {
    pub uniforms: Uniforms,
    pub view: MapView,
}

impl CameraSnapshot {
    pub fn new(uniforms: Uniforms, view: MapView) -> Self {
        Self { uniforms, view }
    }
}

pub(crate) const MODE_FLAT: u32 = 0;
pub(crate) const MODE_GLOBE: u32 = 1;

/// Uniform block consumed by the projection compute shader.
///
/// Layout matches `Uniforms` in the WGSL source (160 bytes, no implicit padding).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub elapsed: f32,
    pub mode: u32,
    pub camera_lat: f32,
    pub camera_lon: f32,
    pub globe_radius: f32,
    pub point_count: u32,
}

impl GpuUniforms {
    pub fn new(uniforms: &Uniforms, globe: Option<GlobeCamera>, point_count: u32) -> Self {
        let (mode, camera) = match globe {
            Some(camera) => (MODE_GLOBE, camera),
            None => (
                MODE_FLAT,
                GlobeCamera {
                    latitude: 0.0,
                    longitude: 0.0,
                    radius: 0.0,
                },
            ),
        };
        Self {
            projection: uniforms.projection.to_cols_array_2d(),
            view: uniforms.view.to_cols_array_2d(),
            viewport: uniforms.viewport.to_array(),
            elapsed: uniforms.elapsed.seconds(),
            mode,
            camera_lat: camera.latitude,
            camera_lon: camera.longitude,
            globe_radius: camera.radius,
            point_count,
        }
    }
}
