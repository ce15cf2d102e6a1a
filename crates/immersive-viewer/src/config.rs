use crate::compositor::{CompositorConfig, DEFAULT_FOV_Y_DEG};
use crate::engine::ProjectionFormat;
use crate::surfaces::MAX_PRIMARY_TARGETS;
use crate::synthetic::SyntheticConfig;
use clap::{Parser, ValueEnum};
use projmesh::{EquirectParams, StereoMode};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

/// `immersive-viewer` - plays a synthetic tiled 360° stream.
///
/// A background decoder produces per-tile test patterns; the compositor
/// latches them, merges them into a display frame and renders that frame on
/// an equirectangular sphere or a cube.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "VIEWER_WINDOW_WIDTH", default_value_t = 1280)]
    pub window_width: u32,

    #[arg(long, env = "VIEWER_WINDOW_HEIGHT", default_value_t = 720)]
    pub window_height: u32,

    /// Number of primary decode targets (parallel tiles).
    #[arg(long, env = "VIEWER_TILES", default_value_t = MAX_PRIMARY_TARGETS as u8,
          value_parser = clap::value_parser!(u8).range(1..=MAX_PRIMARY_TARGETS as i64))]
    pub tiles: u8,

    /// Disable the catch-up (quality upgrade) decode target.
    #[arg(long, env = "VIEWER_NO_CATCH_UP")]
    pub no_catch_up: bool,

    /// Produce a catch-up frame every N decoded frames.
    #[arg(long, default_value = "8")]
    pub catch_up_every: NonZeroU32,

    /// Projection of the synthetic stream.
    #[arg(long, value_enum, env = "VIEWER_PROJECTION", default_value_t = Projection::Equirect)]
    pub projection: Projection,

    /// Composed frame width; defaults to 2048 (equirect) or 1536 (cubemap).
    #[arg(long)]
    pub frame_width: Option<u32>,

    /// Composed frame height; defaults to 1024.
    #[arg(long)]
    pub frame_height: Option<u32>,

    /// Synthetic decoder frame interval in milliseconds.
    #[arg(long, default_value_t = 33)]
    pub frame_interval_ms: u64,

    #[arg(long, default_value_t = 50.0)]
    pub sphere_radius: f32,

    /// Latitude bands of the sphere.
    #[arg(long, default_value_t = 12)]
    pub sphere_rows: u32,

    /// Longitude columns of the sphere.
    #[arg(long, default_value_t = 24)]
    pub sphere_columns: u32,

    #[arg(long, default_value_t = 180.0)]
    pub vertical_fov: f32,

    #[arg(long, default_value_t = 360.0)]
    pub horizontal_fov: f32,

    #[arg(long, value_enum, default_value_t = Stereo::Mono)]
    pub stereo: Stereo,

    /// Face transform codes signalled by the synthetic stream, one per face
    /// in right,left,top,bottom,back,front order.
    #[arg(long, env = "VIEWER_FACE_CODES", default_value = "0,0,0,0,0,0")]
    pub face_codes: FaceCodes,

    /// Viewer vertical field of view in degrees.
    #[arg(long, default_value_t = DEFAULT_FOV_Y_DEG)]
    pub fov: f32,

    /// Exit on GPU errors. Defaults to on in debug builds.
    #[arg(long, env = "VIEWER_HALT_ON_GPU_ERROR")]
    pub halt_on_gpu_error: Option<bool>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Equirect,
    Cubemap,
}

impl From<Projection> for ProjectionFormat {
    fn from(p: Projection) -> Self {
        match p {
            Projection::Equirect => ProjectionFormat::Equirect,
            Projection::Cubemap => ProjectionFormat::Cubemap,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stereo {
    Mono,
    LeftRight,
    TopBottom,
}

impl From<Stereo> for StereoMode {
    fn from(s: Stereo) -> Self {
        match s {
            Stereo::Mono => StereoMode::Mono,
            Stereo::LeftRight => StereoMode::LeftRight,
            Stereo::TopBottom => StereoMode::TopBottom,
        }
    }
}

/// Six comma-separated integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceCodes(pub [i32; 6]);

impl FromStr for FaceCodes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i32>().map_err(|e| format!("'{v}': {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        let codes: [i32; 6] = values
            .try_into()
            .map_err(|v: Vec<i32>| format!("expected 6 face codes, got {}", v.len()))?;
        Ok(FaceCodes(codes))
    }
}

impl std::fmt::Display for FaceCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(i32::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl Config {
    pub fn equirect_params(&self) -> EquirectParams {
        EquirectParams {
            radius: self.sphere_radius,
            latitudes: self.sphere_rows,
            longitudes: self.sphere_columns,
            vertical_fov_deg: self.vertical_fov,
            horizontal_fov_deg: self.horizontal_fov,
            stereo: self.stereo.into(),
        }
    }

    pub fn frame_size(&self) -> (u32, u32) {
        let default_width = match self.projection {
            Projection::Equirect => 2048,
            Projection::Cubemap => 1536,
        };
        (
            self.frame_width.unwrap_or(default_width),
            self.frame_height.unwrap_or(1024),
        )
    }

    /// Tiles are vertical stripes of the composed frame.
    pub fn tile_size(&self) -> (u32, u32) {
        let (w, h) = self.frame_size();
        ((w / self.tiles.max(1) as u32).max(1), h)
    }

    pub fn compositor_config(&self) -> CompositorConfig {
        CompositorConfig {
            halt_on_gpu_error: self
                .halt_on_gpu_error
                .unwrap_or(CompositorConfig::default().halt_on_gpu_error),
            fov_y_deg: self.fov,
        }
    }

    pub fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            projection: self.projection.into(),
            frame_size: self.frame_size(),
            tiles: self.tiles as usize,
            catch_up_every: (!self.no_catch_up).then_some(self.catch_up_every),
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            face_codes: self.face_codes.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::try_parse_from(["immersive-viewer"]).unwrap();
        assert_eq!(cfg.equirect_params(), EquirectParams::default());
        assert_eq!(cfg.tiles as usize, MAX_PRIMARY_TARGETS);
        assert!(!cfg.no_catch_up);
        assert_eq!(cfg.face_codes, FaceCodes([0; 6]));
        assert_eq!(cfg.frame_size(), (2048, 1024));
    }

    #[test]
    fn cubemap_frames_default_to_square_faces() {
        let cfg = Config::try_parse_from(["immersive-viewer", "--projection", "cubemap"]).unwrap();
        let (w, h) = cfg.frame_size();
        assert_eq!(w / 3, h / 2);
    }

    #[test]
    fn face_codes_parse_six_values() {
        assert_eq!("2, 0,0,0,0,7".parse::<FaceCodes>(), Ok(FaceCodes([2, 0, 0, 0, 0, 7])));
        assert!("1,2,3".parse::<FaceCodes>().is_err());
        assert!("1,2,x,4,5,6".parse::<FaceCodes>().is_err());
    }

    #[test]
    fn catch_up_period_must_be_positive() {
        assert!(Config::try_parse_from(["immersive-viewer", "--catch-up-every", "0"]).is_err());
        let cfg = Config::try_parse_from(["immersive-viewer", "--catch-up-every", "3"]).unwrap();
        assert_eq!(cfg.synthetic_config().catch_up_every, NonZeroU32::new(3));
        let off = Config::try_parse_from(["immersive-viewer", "--no-catch-up"]).unwrap();
        assert_eq!(off.synthetic_config().catch_up_every, None);
    }

    #[test]
    fn tile_count_is_bounded() {
        assert!(Config::try_parse_from(["immersive-viewer", "--tiles", "0"]).is_err());
        assert!(Config::try_parse_from(["immersive-viewer", "--tiles", "6"]).is_err());
        let cfg = Config::try_parse_from(["immersive-viewer", "--tiles", "4"]).unwrap();
        assert_eq!(cfg.tile_size(), (512, 1024));
    }
}
