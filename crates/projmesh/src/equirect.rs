//! Equirectangular sphere patch built as latitude strips.
//!
//! Each latitude band is one triangle strip. Strips are chained into a single
//! draw by duplicating the first and last vertex of every band, which yields
//! degenerate triangles at the seams instead of needing an index buffer.

use crate::GeometryError;
use std::f32::consts::PI;

/// Per-vertex layout: `[x, y, z, u_left, v_left, u_right, v_right]`.
/// Must match the vertex inputs of the equirect WGSL shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EquirectVertex {
    pub position: [f32; 3],
    pub uv_left: [f32; 2],
    pub uv_right: [f32; 2],
}

/// How the two eyes are packed into the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoMode {
    /// Both eyes sample the full frame.
    #[default]
    Mono,
    /// Left eye in the left half, right eye in the right half.
    LeftRight,
    /// Left eye in the top half, right eye in the bottom half.
    TopBottom,
}

/// Sphere construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquirectParams {
    /// Sphere radius, must be > 0.
    pub radius: f32,
    /// Number of latitude bands, must be >= 1.
    pub latitudes: u32,
    /// Number of longitude columns, must be >= 1.
    pub longitudes: u32,
    /// Latitudinal coverage in degrees, in (0, 180].
    pub vertical_fov_deg: f32,
    /// Longitudinal coverage in degrees, in (0, 360].
    pub horizontal_fov_deg: f32,
    pub stereo: StereoMode,
}

impl Default for EquirectParams {
    fn default() -> Self {
        Self {
            radius: 50.0,
            latitudes: 12,
            longitudes: 24,
            vertical_fov_deg: 180.0,
            horizontal_fov_deg: 360.0,
            stereo: StereoMode::Mono,
        }
    }
}

impl EquirectParams {
    /// Checks every parameter against its own range. NaNs are rejected.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(GeometryError::InvalidParameters(format!(
                "radius must be > 0, got {}",
                self.radius
            )));
        }
        if self.latitudes < 1 || self.longitudes < 1 {
            return Err(GeometryError::InvalidParameters(format!(
                "latitudes and longitudes must be >= 1, got {}x{}",
                self.latitudes, self.longitudes
            )));
        }
        if !(self.vertical_fov_deg > 0.0 && self.vertical_fov_deg <= 180.0) {
            return Err(GeometryError::InvalidParameters(format!(
                "vertical FOV must be in (0, 180], got {}",
                self.vertical_fov_deg
            )));
        }
        if !(self.horizontal_fov_deg > 0.0 && self.horizontal_fov_deg <= 360.0) {
            return Err(GeometryError::InvalidParameters(format!(
                "horizontal FOV must be in (0, 360], got {}",
                self.horizontal_fov_deg
            )));
        }
        Ok(())
    }

    /// Number of vertices `build_equirect` emits for these parameters:
    /// `2 * (longitudes + 1)` strip vertices plus 2 degenerates per band.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        (2 * (self.longitudes as usize + 1) + 2) * self.latitudes as usize
    }
}

/// CPU-side sphere patch, ready for upload as a triangle strip.
#[derive(Debug, Clone)]
pub struct EquirectGeometry {
    params: EquirectParams,
    vertices: Vec<EquirectVertex>,
}

impl EquirectGeometry {
    #[inline]
    pub fn params(&self) -> &EquirectParams {
        &self.params
    }

    #[inline]
    pub fn vertices(&self) -> &[EquirectVertex] {
        &self.vertices
    }
}

/// Builds the sphere patch. Fails without producing any data if a parameter
/// is out of range.
pub fn build_equirect(params: &EquirectParams) -> Result<EquirectGeometry, GeometryError> {
    params.validate()?;

    let v_fov = params.vertical_fov_deg.to_radians();
    let h_fov = params.horizontal_fov_deg.to_radians();
    let quad_h = v_fov / params.latitudes as f32;
    let quad_w = h_fov / params.longitudes as f32;
    let radius = params.radius;

    let mut vertices = Vec::with_capacity(params.vertex_count());

    for j in 0..params.latitudes {
        // Band spans [phi_low, phi_high]; each vertical edge sits at a theta.
        let phi_low = quad_h * j as f32 - v_fov / 2.0;
        let phi_high = quad_h * (j + 1) as f32 - v_fov / 2.0;

        for i in 0..=params.longitudes {
            for k in 0..2u32 {
                let phi = if k == 0 { phi_low } else { phi_high };
                let theta = quad_w * i as f32 + PI - h_fov / 2.0;
                let (sin_phi, cos_phi) = phi.sin_cos();
                let (sin_theta, cos_theta) = theta.sin_cos();

                let position = [
                    -radius * sin_theta * cos_phi,
                    radius * sin_phi,
                    radius * cos_theta * cos_phi,
                ];

                let u = i as f32 * quad_w / h_fov;
                let v = (j + k) as f32 * quad_h / v_fov;
                let (uv_left, uv_right) = eye_uvs(params.stereo, u, v);

                vertices.push(EquirectVertex {
                    position,
                    uv_left,
                    uv_right,
                });

                // Degenerate copies of the first and last point of the band.
                if (i == 0 && k == 0) || (i == params.longitudes && k == 1) {
                    let last = vertices[vertices.len() - 1];
                    vertices.push(last);
                }
            }
        }
    }

    debug_assert_eq!(vertices.len(), params.vertex_count());

    Ok(EquirectGeometry {
        params: *params,
        vertices,
    })
}

/// Maps a normalised (u, v) on the sphere to the left/right eye texture
/// coordinates. V is flipped so that v = 0 is the top row of the frame.
#[inline]
fn eye_uvs(stereo: StereoMode, u: f32, v: f32) -> ([f32; 2], [f32; 2]) {
    match stereo {
        StereoMode::Mono => ([u, 1.0 - v], [u, 1.0 - v]),
        StereoMode::LeftRight => ([u / 2.0, 1.0 - v], [u / 2.0 + 0.5, 1.0 - v]),
        StereoMode::TopBottom => ([u, 1.0 - (v / 2.0 + 0.5)], [u, 1.0 - v / 2.0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(latitudes: u32, longitudes: u32) -> EquirectParams {
        EquirectParams {
            latitudes,
            longitudes,
            ..EquirectParams::default()
        }
    }

    #[test]
    fn vertex_count_matches_formula() {
        for (lat, lon) in [(1, 1), (12, 24), (3, 7), (90, 180)] {
            let geom = build_equirect(&params(lat, lon)).unwrap();
            let expected = (2 * (lon as usize + 1) + 2) * lat as usize;
            assert_eq!(geom.vertices().len(), expected, "lat={lat} lon={lon}");
        }
    }

    #[test]
    fn every_vertex_lies_on_the_sphere() {
        let p = EquirectParams {
            radius: 7.5,
            latitudes: 9,
            longitudes: 17,
            vertical_fov_deg: 120.0,
            horizontal_fov_deg: 200.0,
            stereo: StereoMode::TopBottom,
        };
        let geom = build_equirect(&p).unwrap();
        for v in geom.vertices() {
            let [x, y, z] = v.position;
            let r = (x * x + y * y + z * z).sqrt();
            assert!((r - 7.5).abs() < 1e-4, "radius {r}");
        }
    }

    #[test]
    fn degenerate_vertices_duplicate_strip_ends() {
        let p = params(2, 4);
        let geom = build_equirect(&p).unwrap();
        let per_band = 2 * (4 + 1) + 2;
        for band in geom.vertices().chunks(per_band) {
            assert_eq!(band[0], band[1]);
            assert_eq!(band[per_band - 2], band[per_band - 1]);
        }
    }

    #[test]
    fn rejects_zero_latitudes_and_wide_hfov() {
        let err = build_equirect(&params(0, 24)).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidParameters(_)));

        let wide = EquirectParams {
            horizontal_fov_deg: 400.0,
            ..EquirectParams::default()
        };
        assert!(matches!(
            build_equirect(&wide),
            Err(GeometryError::InvalidParameters(_))
        ));
    }

    #[test]
    fn rejects_bad_radius_and_vfov() {
        for p in [
            EquirectParams { radius: 0.0, ..Default::default() },
            EquirectParams { radius: f32::NAN, ..Default::default() },
            EquirectParams { vertical_fov_deg: 0.0, ..Default::default() },
            EquirectParams { vertical_fov_deg: 181.0, ..Default::default() },
            EquirectParams { longitudes: 0, ..Default::default() },
        ] {
            assert!(build_equirect(&p).is_err(), "{p:?} should be rejected");
        }
    }

    #[test]
    fn stereo_modes_split_uvs() {
        let mono = build_equirect(&EquirectParams::default()).unwrap();
        assert!(mono.vertices().iter().all(|v| v.uv_left == v.uv_right));

        let lr = build_equirect(&EquirectParams {
            stereo: StereoMode::LeftRight,
            ..Default::default()
        })
        .unwrap();
        for v in lr.vertices() {
            assert!(v.uv_left[0] <= 0.5 + 1e-6);
            assert!(v.uv_right[0] >= 0.5 - 1e-6);
            assert_eq!(v.uv_left[1], v.uv_right[1]);
        }

        let tb = build_equirect(&EquirectParams {
            stereo: StereoMode::TopBottom,
            ..Default::default()
        })
        .unwrap();
        for v in tb.vertices() {
            assert!(v.uv_left[1] <= 0.5 + 1e-6);
            assert!(v.uv_right[1] >= 0.5 - 1e-6);
            assert_eq!(v.uv_left[0], v.uv_right[0]);
        }
    }
}
