use crate::{
    backend::Eye,
    camera::{CameraController, HeadCamera},
    compositor::{Compositor, CompositorHandle, TickOutcome},
    config::Config,
    engine::StreamEngine,
    error::ViewerError,
    mesh::UnboundMesh,
    renderer::WgpuBackend,
    surfaces::DecodeTargetId,
    synthetic::SyntheticEngine,
    ui::{Hud, HudStats},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use winit::{
    event::{ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

pub struct App {
    pub compositor: Compositor<WgpuBackend, SyntheticEngine>,
    pub camera: HeadCamera,
    pub camera_controller: CameraController,
    pub hud: Hud,
    handle: CompositorHandle,
    eye: Eye,
    last_outcome: Option<TickOutcome>,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let backend = WgpuBackend::new(window.clone()).await?;
        let hud = Hud::new(&window, &backend.gfx);

        let engine = SyntheticEngine::new(config.synthetic_config());
        let compositor = Compositor::new(backend, engine, config.compositor_config());
        let handle = compositor.handle();

        let mut app = Self {
            compositor,
            camera: HeadCamera::new(),
            camera_controller: CameraController::new(),
            hud,
            handle,
            eye: Eye::Left,
            last_outcome: None,
        };
        app.open_stream(config)?;
        Ok(app)
    }

    /// Creates every decode target, sizes the display target for the
    /// stream's projection and starts decoding.
    fn open_stream(&mut self, config: &Config) -> Result<()> {
        self.compositor.on_graphics_context_ready();

        let (tile_w, tile_h) = config.tile_size();
        let mut decoders = Vec::with_capacity(config.tiles as usize);
        for index in 0..config.tiles as usize {
            let id = DecodeTargetId::primary(index)?;
            let binding = self
                .compositor
                .create_decode_target(tile_w, tile_h, id)
                .with_context(|| format!("creating decode target {id}"))?;
            decoders.push(binding.surface);
        }
        let catch_up = if config.no_catch_up {
            None
        } else {
            let binding = self
                .compositor
                .create_decode_target(tile_w, tile_h, DecodeTargetId::catch_up())
                .context("creating catch-up decode target")?;
            Some(binding.surface)
        };
        self.compositor.engine_mut().open(decoders, catch_up);

        let format = self.compositor.engine().projection_format();
        let (frame_w, frame_h) = self.compositor.engine().frame_dimensions();
        let mesh = UnboundMesh::for_format(format, &config.equirect_params())
            .context("building projection mesh")?;
        let display = self
            .compositor
            .create_display_target(frame_w, frame_h, mesh)
            .with_context(|| format!("creating {format:?} display target {frame_w}x{frame_h}"))?;
        self.compositor.engine_mut().attach_display(display);

        self.compositor.engine_mut().start()?;
        log::info!(
            "Streaming {} tile(s) of {tile_w}x{tile_h} into a {frame_w}x{frame_h} {format:?} frame.",
            config.tiles
        );
        Ok(())
    }

    pub fn surface_size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.compositor.backend().gfx.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.compositor.backend_mut().resize(new_size);
        }
    }

    /// Returns `true` if the event was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        if self.hud.on_window_event(window, event) {
            return true;
        }

        if self.camera_controller.handle_event(event, &mut self.camera) {
            self.handle.push_pose(self.camera.pose());
        }

        match event {
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
                false
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => {
                        self.compositor.engine_mut().toggle_pause();
                        true
                    }
                    PhysicalKey::Code(KeyCode::KeyE) => {
                        self.eye = match self.eye {
                            Eye::Left => Eye::Right,
                            Eye::Right => Eye::Left,
                        };
                        true
                    }
                    PhysicalKey::Code(KeyCode::KeyH) => {
                        self.hud.visible = !self.hud.visible;
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Ticks the compositor into the swap chain and draws the HUD on top.
    ///
    /// Surface errors are returned as-is so the caller can downcast them;
    /// a halting GPU error is returned as [`ViewerError::Gpu`].
    pub fn render(&mut self, window: &Window) -> Result<()> {
        let frame = self.compositor.backend().gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.compositor.backend_mut().begin_frame(swap_view);
        let size = self.surface_size();
        match self
            .compositor
            .tick(self.camera.view(), self.eye, size.width, size.height)
        {
            Ok(outcome) => self.last_outcome = Some(outcome),
            Err(err @ ViewerError::Gpu(_)) => return Err(err.into()),
            Err(err) => log::warn!("Frame skipped: {err}"),
        }

        if let Some(swap_view) = self.compositor.backend_mut().end_frame() {
            let stats = self.stats();
            self.hud
                .draw(window, &self.compositor.backend().gfx, &swap_view, &stats);
        }
        frame.present();
        Ok(())
    }

    fn stats(&self) -> HudStats {
        let engine = self.compositor.engine();
        let pose = self.camera.pose();
        HudStats {
            state: self.compositor.state(),
            player: engine.status(),
            counters: self.compositor.counters(),
            mesh: self.compositor.active_mesh_kind(),
            outcome: self.last_outcome,
            eye: self.eye,
            yaw_deg: pose.yaw,
            pitch_deg: pose.pitch,
            frames_produced: engine.frames_produced(),
            catch_up_released: engine.catch_up_released(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.last_outcome, Some(TickOutcome::Stopped))
    }

    pub fn shutdown(&mut self) {
        self.compositor.shutdown();
    }
}
