//! Per-frame orchestration of decode latching, display compositing, mesh
//! swaps and drawing.
//!
//! The compositor runs on the render thread, once per display refresh. It
//! latches at most one primary frame per tick, absorbs at most one catch-up
//! frame, and composites into the display texture on every other tick at
//! most. Pose updates and mesh staging arrive from other threads through a
//! [`CompositorHandle`].

use crate::backend::{DrawParams, Eye, RenderBackend, TextureKind};
use crate::engine::{PlayerStatus, ProjectionFormat, StreamEngine};
use crate::mesh::{BoundMesh, UnboundMesh};
use crate::pose::{PoseHistory, PoseSample};
use crate::surfaces::{DecodeTargetBinding, DecodeTargetId, DisplaySurface, SurfaceRegistry, TargetGroup};
use crate::{Result, ViewerError};
use glam::Mat4;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use projmesh::FaceTransformCodes;
use std::sync::Arc;

/// Vertical field of view of the viewer, degrees.
pub const DEFAULT_FOV_Y_DEG: f32 = 90.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorConfig {
    /// Treat errors from the GPU error channel as fatal.
    pub halt_on_gpu_error: bool,
    pub fov_y_deg: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            halt_on_gpu_error: cfg!(debug_assertions),
            fov_y_deg: DEFAULT_FOV_Y_DEG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositorState {
    /// No active mesh yet.
    WaitingForPeers,
    Active,
    /// Terminal.
    Stopped,
}

/// Frame pacing counters. `display_advance <= decode_advance` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounters {
    /// Primary frames consumed.
    pub decode_advance: u64,
    /// Frames actually composited.
    pub display_advance: u64,
    /// Render calls, free running.
    pub draw_tick: u64,
}

impl FrameCounters {
    /// Compositing is due on even ticks while decode is ahead of display.
    #[inline]
    pub fn compose_due(&self) -> bool {
        self.draw_tick % 2 == 0 && self.decode_advance > self.display_advance
    }

    fn advance_display(&mut self) -> Result<()> {
        if self.display_advance >= self.decode_advance {
            return Err(ViewerError::InconsistentCounters {
                decode: self.decode_advance,
                display: self.display_advance + 1,
            });
        }
        self.display_advance += 1;
        Ok(())
    }
}

/// Result of one [`Compositor::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Stopped,
    /// Player is ready or paused; nothing was done.
    NotPlaying,
    WaitingForPeers,
    Drawn { composed: bool },
}

#[derive(Debug, Default)]
struct SharedState {
    pending: Option<UnboundMesh>,
    poses: PoseHistory,
    counters: FrameCounters,
}

/// Thread-safe entry points for the pose producer and stream-open code.
#[derive(Debug, Clone)]
pub struct CompositorHandle {
    shared: Arc<Mutex<SharedState>>,
}

impl CompositorHandle {
    pub fn push_pose(&self, pose: PoseSample) {
        self.shared.lock().poses.push(pose);
    }

    /// Stages `mesh` for promotion on the next tick, replacing an older
    /// pending mesh. It stays pending while the display target is of the
    /// other projection kind.
    pub fn stage_mesh(&self, mesh: UnboundMesh) {
        let kind = mesh.kind();
        if let Some(old) = self.shared.lock().pending.replace(mesh) {
            debug!("Pending {:?} mesh replaced before promotion.", old.kind());
        }
        info!("Staged {kind:?} mesh.");
    }

    pub fn counters(&self) -> FrameCounters {
        self.shared.lock().counters
    }
}

pub struct Compositor<B: RenderBackend, E: StreamEngine> {
    backend: B,
    engine: E,
    registry: SurfaceRegistry,
    shared: Arc<Mutex<SharedState>>,
    config: CompositorConfig,
    state: CompositorState,
    active: Option<BoundMesh>,
    face_codes: Option<FaceTransformCodes>,
    codes_fetched: bool,
    catch_up_pending_release: bool,
    shut_down: bool,
}

impl<B: RenderBackend, E: StreamEngine> Compositor<B, E> {
    pub fn new(backend: B, engine: E, config: CompositorConfig) -> Self {
        Self {
            backend,
            engine,
            registry: SurfaceRegistry::new(),
            shared: Arc::new(Mutex::new(SharedState::default())),
            config,
            state: CompositorState::WaitingForPeers,
            active: None,
            face_codes: None,
            codes_fetched: false,
            catch_up_pending_release: false,
            shut_down: false,
        }
    }

    // --- Accessors ---------------------------------------------------------

    #[inline]
    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn counters(&self) -> FrameCounters {
        self.shared.lock().counters
    }

    pub fn active_mesh_kind(&self) -> Option<ProjectionFormat> {
        self.active.as_ref().map(BoundMesh::kind)
    }

    pub fn handle(&self) -> CompositorHandle {
        CompositorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    #[inline]
    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    // --- Stream setup ------------------------------------------------------

    pub fn on_graphics_context_ready(&mut self) {
        self.registry.on_graphics_context_ready(&mut self.backend);
    }

    pub fn create_decode_target(
        &mut self,
        width: u32,
        height: u32,
        id: DecodeTargetId,
    ) -> Result<DecodeTargetBinding> {
        self.registry
            .create_decode_target(&mut self.backend, width, height, id)
    }

    /// Sizes the display target for `mesh` and stages the mesh for promotion.
    pub fn create_display_target(
        &mut self,
        width: u32,
        height: u32,
        mesh: UnboundMesh,
    ) -> Result<DisplaySurface> {
        let (_, surface) =
            self.registry
                .create_display_target(&mut self.backend, width, height, mesh.kind())?;
        self.handle().stage_mesh(mesh);
        Ok(surface)
    }

    pub fn on_pose_updated(&self, pose: PoseSample) {
        self.shared.lock().poses.push(pose);
    }

    // --- Per-frame ---------------------------------------------------------

    /// Runs one frame. `view` is the head rotation, `width`/`height` the
    /// viewport used for the projection.
    pub fn tick(&mut self, view: Mat4, eye: Eye, width: u32, height: u32) -> Result<TickOutcome> {
        if self.state == CompositorState::Stopped {
            return Ok(TickOutcome::Stopped);
        }

        match self.engine.status() {
            PlayerStatus::Stopped => {
                info!("Player stopped; compositor is now terminal.");
                self.state = CompositorState::Stopped;
                return Ok(TickOutcome::Stopped);
            }
            PlayerStatus::Playing => {}
            status => {
                trace!("Player {status:?}; skipping frame.");
                return Ok(TickOutcome::NotPlaying);
            }
        }

        self.promote_pending_mesh();
        self.check_gpu_errors()?;
        if self.active.is_none() {
            self.state = CompositorState::WaitingForPeers;
            return Ok(TickOutcome::WaitingForPeers);
        }
        self.state = CompositorState::Active;

        self.forward_pose();
        self.consume_catch_up();
        self.consume_primary();
        let composed = self.advance_display()?;

        if let (Some(mesh), Some(codes)) = (self.active.as_mut(), self.face_codes.as_ref()) {
            if mesh.correct_faces(&mut self.backend, codes) {
                info!("Applied face transforms {codes:?} to the active cubemap.");
            }
        }

        if let Some(mesh) = self.active.as_ref() {
            let params = DrawParams {
                view_proj: self.projection(width, height) * view,
                eye,
            };
            self.backend.draw_mesh(mesh.handle(), &params);
        }
        self.check_gpu_errors()?;

        Ok(TickOutcome::Drawn { composed })
    }

    fn projection(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Mat4::perspective_rh(self.config.fov_y_deg.to_radians(), aspect, Z_NEAR, Z_FAR)
    }

    /// Binds the pending mesh and retires the active one, under the shared lock.
    fn promote_pending_mesh(&mut self) {
        let mut shared = self.shared.lock();
        let Some(mesh) = shared.pending.take() else {
            return;
        };
        let Some(display) = self.registry.display_target().copied() else {
            debug!("Pending {:?} mesh waits for a display target.", mesh.kind());
            shared.pending = Some(mesh);
            return;
        };
        // A mesh only binds to a display texture of its own kind; switching
        // projection goes through `create_display_target`.
        if display.kind != TextureKind::for_projection(mesh.kind()) {
            debug!(
                "Pending {:?} mesh waits for a matching display target (have {:?}).",
                mesh.kind(),
                display.kind
            );
            shared.pending = Some(mesh);
            return;
        }
        let texture = display.texture;

        match mesh.bind(&mut self.backend, texture) {
            Ok(bound) => {
                if let Some(old) = self.active.take() {
                    debug!("Retiring {:?} mesh.", old.kind());
                    old.release(&mut self.backend);
                }
                info!("Promoted {:?} mesh to active.", bound.kind());
                self.active = Some(bound);
            }
            Err((mesh, err)) => {
                warn!("Binding {:?} mesh failed: {err}", mesh.kind());
                shared.pending = Some(mesh);
            }
        }
    }

    fn forward_pose(&mut self) {
        let (pose, timestamp) = {
            let mut shared = self.shared.lock();
            let timestamp = shared.counters.decode_advance;
            (shared.poses.stamp_and_peek(timestamp), timestamp)
        };
        if let Some(pose) = pose {
            self.engine.set_viewport_pose(pose, timestamp);
        }
    }

    fn consume_catch_up(&mut self) {
        if !self.registry.take_frame_edge(TargetGroup::CatchUp) {
            return;
        }
        if self
            .registry
            .advance(&mut self.backend, TargetGroup::CatchUp)
            .is_done()
        {
            debug!("Catch-up frame latched.");
            self.catch_up_pending_release = true;
        } else {
            debug!("Catch-up edge without a queued frame.");
        }
    }

    fn consume_primary(&mut self) {
        if !self.registry.take_frame_edge(TargetGroup::Primary) {
            return;
        }
        if self
            .registry
            .advance(&mut self.backend, TargetGroup::Primary)
            .is_done()
        {
            let decode = {
                let mut shared = self.shared.lock();
                shared.counters.decode_advance += 1;
                shared.counters.decode_advance
            };
            trace!("Primary frame latched, decode advance {decode}.");
        } else {
            debug!("Primary edge without a queued frame.");
        }
    }

    /// Rate-limited compose step. Returns whether a frame was composited.
    fn advance_display(&mut self) -> Result<bool> {
        let counters = {
            let mut shared = self.shared.lock();
            shared.counters.draw_tick += 1;
            shared.counters
        };
        if !counters.compose_due() {
            return Ok(false);
        }

        if !self
            .engine
            .compose_display_frame(counters.display_advance)
            .is_done()
        {
            debug!("Compose of frame {} not ready.", counters.display_advance);
            return Ok(false);
        }

        if let Err(err) = self.shared.lock().counters.advance_display() {
            error!("{err}; aborting tick.");
            return Err(err);
        }
        self.registry.latch_display(&mut self.backend);
        debug!("Composited display frame {}.", counters.display_advance);

        if self.catch_up_pending_release {
            self.catch_up_pending_release = false;
            if let Some(target) = self.registry.release_catch_up() {
                debug!("Releasing {target} after compose.");
                self.engine.release_texture(target);
            }
        }

        if !self.codes_fetched {
            self.codes_fetched = true;
            self.fetch_face_codes();
        }
        Ok(true)
    }

    fn fetch_face_codes(&mut self) {
        let Some(raw) = self.engine.face_transform_codes() else {
            debug!("Stream signalled no face transform codes.");
            return;
        };
        match FaceTransformCodes::from_raw(raw) {
            Ok(codes) if codes.is_identity() => debug!("Identity face transforms; nothing to correct."),
            Ok(codes) => {
                info!("Face transform codes {raw:?}.");
                self.face_codes = Some(codes);
            }
            Err(err) => warn!("Ignoring face transform codes {raw:?}: {err}"),
        }
    }

    fn check_gpu_errors(&mut self) -> Result<()> {
        while let Some(message) = self.backend.take_error() {
            error!("GPU error: {message}");
            if self.config.halt_on_gpu_error {
                return Err(ViewerError::Gpu(message));
            }
        }
        Ok(())
    }

    // --- Teardown ----------------------------------------------------------

    /// Stops decode callbacks and frees every GPU resource. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.engine.shutdown();

        let mut shared = self.shared.lock();
        shared.pending = None;
        if let Some(mesh) = self.active.take() {
            mesh.release(&mut self.backend);
        }
        self.registry.shutdown(&mut self.backend);
        self.state = CompositorState::Stopped;
        drop(shared);

        info!("Stream torn down.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_only_on_even_ticks_with_backlog() {
        let mut c = FrameCounters {
            decode_advance: 1,
            display_advance: 0,
            draw_tick: 1,
        };
        assert!(!c.compose_due());
        c.draw_tick = 2;
        assert!(c.compose_due());
        c.display_advance = 1;
        assert!(!c.compose_due());
    }

    #[test]
    fn display_never_overtakes_decode() {
        let mut c = FrameCounters::default();
        assert_eq!(
            c.advance_display(),
            Err(ViewerError::InconsistentCounters {
                decode: 0,
                display: 1
            })
        );
        c.decode_advance = 1;
        assert!(c.advance_display().is_ok());
        assert_eq!(c.display_advance, 1);
    }

    #[test]
    fn default_config_halts_on_gpu_error_in_debug_builds() {
        assert_eq!(
            CompositorConfig::default().halt_on_gpu_error,
            cfg!(debug_assertions)
        );
    }
}
