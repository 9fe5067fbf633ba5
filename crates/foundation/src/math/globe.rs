use std::f32::consts::PI;

use glam::{Vec2, Vec3};

/// Spherical coordinates in radians.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLon {
    pub lat_rad: f32,
    pub lon_rad: f32,
}

impl LatLon {
    pub fn new(lat_rad: f32, lon_rad: f32) -> Self {
        Self { lat_rad, lon_rad }
    }
}

/// Normalized Web Mercator UV (`[-1, 1]`, y up) to latitude/longitude.
pub fn uv_to_lat_lon(uv: Vec2) -> LatLon {
    let lon = uv.x * PI;
    let lat = (uv.y * PI).sinh().atan();
    LatLon::new(lat, lon)
}

pub fn lat_lon_to_uv(geo: LatLon) -> Vec2 {
    let x = geo.lon_rad / PI;
    let y = (PI * 0.25 + geo.lat_rad * 0.5).tan().ln() / PI;
    Vec2::new(x, y)
}

/// Point on the unit sphere, rotated so the camera's `(lat, lon)` faces `+z`.
///
/// The rotation is `R_x(camera.lat) * R_y(-camera.lon)`; the `z` component of
/// the result is positive exactly on the hemisphere facing the camera.
pub fn sphere_point(geo: LatLon, camera: LatLon) -> Vec3 {
    let d_lon = geo.lon_rad - camera.lon_rad;
    let (sin_lat, cos_lat) = geo.lat_rad.sin_cos();
    let (sin_dlon, cos_dlon) = d_lon.sin_cos();

    let x = cos_lat * sin_dlon;
    let y = sin_lat;
    let z = cos_lat * cos_dlon;

    let (sin_c, cos_c) = camera.lat_rad.sin_cos();
    Vec3::new(x, y * cos_c - z * sin_c, y * sin_c + z * cos_c)
}
