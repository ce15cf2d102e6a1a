//! Boundary to the streaming/decoding engine that feeds the compositor.

use crate::pose::PoseSample;
use crate::surfaces::DecodeTargetId;

pub use projmesh::ProjectionKind as ProjectionFormat;

/// Playback state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerStatus {
    Ready,
    Playing,
    Paused,
    Stopped,
}

impl PlayerStatus {
    /// Maps the engine's raw status code. Unknown codes read as `Ready`.
    pub fn from_raw(code: i32) -> Self {
        match code {
            1 => PlayerStatus::Playing,
            2 => PlayerStatus::Paused,
            3 => PlayerStatus::Stopped,
            _ => PlayerStatus::Ready,
        }
    }
}

/// Outcome of a step that depends on the engine having data available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Done,
    NotReady,
}

impl EngineStatus {
    #[inline]
    pub fn is_done(self) -> bool {
        self == EngineStatus::Done
    }
}

/// The native streaming engine as seen from the render context.
///
/// All methods are called from the render thread only. Implementations hand
/// decoded images to the compositor through the `DecodeSurface`s they were
/// opened with, never through this trait.
pub trait StreamEngine {
    fn status(&self) -> PlayerStatus;

    /// Returns a consumed catch-up buffer to the engine.
    fn release_texture(&mut self, target: DecodeTargetId);

    /// Merges the tiles of `frame_index` into the display surface.
    fn compose_display_frame(&mut self, frame_index: u64) -> EngineStatus;

    fn projection_format(&self) -> ProjectionFormat;

    fn frame_dimensions(&self) -> (u32, u32);

    /// Raw per-face transform codes, `None` while the stream has not signalled them.
    fn face_transform_codes(&self) -> Option<[i32; 6]>;

    /// Viewport feedback used for adaptive tile selection.
    fn set_viewport_pose(&mut self, pose: PoseSample, timestamp: u64);

    /// Stops decode callbacks. Called once during stream teardown.
    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_status_codes() {
        assert_eq!(PlayerStatus::from_raw(0), PlayerStatus::Ready);
        assert_eq!(PlayerStatus::from_raw(1), PlayerStatus::Playing);
        assert_eq!(PlayerStatus::from_raw(2), PlayerStatus::Paused);
        assert_eq!(PlayerStatus::from_raw(3), PlayerStatus::Stopped);
        assert_eq!(PlayerStatus::from_raw(42), PlayerStatus::Ready);
    }
}
