use foundation::math::{LatLon, sphere_point, uv_to_lat_lon};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::uniforms::{GlobeCamera, Uniforms};

/// One point to project: a tile-local position and the transform slot of its tile.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProjectionInput {
    pub location: [f32; 2],
    pub transform: u32,
    pub _pad: u32,
}

impl ProjectionInput {
    pub fn new(location: Vec2, transform: u32) -> Self {
        Self {
            location: location.to_array(),
            transform,
            _pad: 0,
        }
    }

    pub fn location(&self) -> Vec2 {
        Vec2::from_array(self.location)
    }
}

/// Projected point in pixels, y up, origin at the bottom-left of the viewport.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPoint {
    pub position: Vec2,
    pub visible: bool,
}

impl ScreenPoint {
    pub const HIDDEN: ScreenPoint = ScreenPoint {
        position: Vec2::ZERO,
        visible: false,
    };
}

/// Readback layout written by the compute shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuScreenPoint {
    pub position: [f32; 2],
    pub visible: u32,
    pub _pad: u32,
}

impl From<GpuScreenPoint> for ScreenPoint {
    fn from(p: GpuScreenPoint) -> Self {
        ScreenPoint {
            position: Vec2::from_array(p.position),
            visible: p.visible != 0,
        }
    }
}

/// Per-tile globe placement in normalized map UV.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobeTileParams {
    pub center_x: f32,
    pub center_y: f32,
    pub factor: f32,
    pub _pad: f32,
}

impl GlobeTileParams {
    pub fn new(center_x: f32, center_y: f32, factor: f32) -> Self {
        Self {
            center_x,
            center_y,
            factor,
            _pad: 0.0,
        }
    }

    fn uv(&self, local: Vec2) -> Vec2 {
        Vec2::new(
            self.center_x + local.x * self.factor,
            self.center_y + local.y * self.factor,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatProjection {
    /// Model matrix per transform slot.
    pub matrices: Vec<Mat4>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobeProjection {
    pub camera: GlobeCamera,
    pub tiles: Vec<GlobeTileParams>,
}

/// Transform set for a batch. Each variant owns its per-slot data.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionMode {
    Flat(FlatProjection),
    Globe(GlobeProjection),
}

impl ProjectionMode {
    pub fn transform_count(&self) -> usize {
        match self {
            ProjectionMode::Flat(flat) => flat.matrices.len(),
            ProjectionMode::Globe(globe) => globe.tiles.len(),
        }
    }

    pub fn globe_camera(&self) -> Option<GlobeCamera> {
        match self {
            ProjectionMode::Flat(_) => None,
            ProjectionMode::Globe(globe) => Some(globe.camera),
        }
    }

    pub fn project(&self, uniforms: &Uniforms, input: &ProjectionInput) -> ScreenPoint {
        self.project_local(uniforms, input.transform, input.location())
    }

    /// Projects one tile-local point. An unknown transform slot yields a hidden point.
    pub fn project_local(&self, uniforms: &Uniforms, transform: u32, local: Vec2) -> ScreenPoint {
        let view_projection = uniforms.view_projection();
        match self {
            ProjectionMode::Flat(flat) => {
                let Some(model) = flat.matrices.get(transform as usize) else {
                    return ScreenPoint::HIDDEN;
                };
                let clip = view_projection * *model * Vec4::new(local.x, local.y, 0.0, 1.0);
                to_screen(clip, uniforms.viewport, clip.w > 0.0)
            }
            ProjectionMode::Globe(globe) => {
                let Some(tile) = globe.tiles.get(transform as usize) else {
                    return ScreenPoint::HIDDEN;
                };
                let geo = uv_to_lat_lon(tile.uv(local));
                let camera = LatLon::new(globe.camera.latitude, globe.camera.longitude);
                let on_sphere = sphere_point(geo, camera);
                let world: Vec3 = on_sphere * globe.camera.radius;
                let clip = view_projection * world.extend(1.0);
                to_screen(clip, uniforms.viewport, on_sphere.z > 0.0 && clip.w > 0.0)
            }
        }
    }

    /// Transform data as the shader reads it: four columns per flat matrix,
    /// one `vec4` per globe tile.
    pub fn packed_transforms(&self) -> Vec<[f32; 4]> {
        match self {
            ProjectionMode::Flat(flat) => flat
                .matrices
                .iter()
                .flat_map(|m| m.to_cols_array_2d())
                .collect(),
            ProjectionMode::Globe(globe) => globe
                .tiles
                .iter()
                .map(|t| [t.center_x, t.center_y, t.factor, 0.0])
                .collect(),
        }
    }
}

fn to_screen(clip: Vec4, viewport: Vec2, visible: bool) -> ScreenPoint {
    if clip.w == 0.0 {
        return ScreenPoint::HIDDEN;
    }
    let ndc = Vec2::new(clip.x, clip.y) / clip.w;
    ScreenPoint {
        position: (ndc + Vec2::ONE) * 0.5 * viewport,
        visible,
    }
}

/// Projects a whole batch on the CPU. Shares its math with the shader.
pub fn project_all(mode: &ProjectionMode, uniforms: &Uniforms, inputs: &[ProjectionInput]) -> Vec<ScreenPoint> {
    inputs.iter().map(|input| mode.project(uniforms, input)).collect()
}
