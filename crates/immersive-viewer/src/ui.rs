use crate::backend::Eye;
use crate::compositor::{CompositorState, FrameCounters, TickOutcome};
use crate::engine::{PlayerStatus, ProjectionFormat};
use crate::renderer::context::GfxContext;
use winit::{event::WindowEvent, window::Window};

/// Snapshot of what the overlay shows for one frame.
#[derive(Debug, Clone, Copy)]
pub struct HudStats {
    pub state: CompositorState,
    pub player: PlayerStatus,
    pub counters: FrameCounters,
    pub mesh: Option<ProjectionFormat>,
    pub outcome: Option<TickOutcome>,
    pub eye: Eye,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub frames_produced: u64,
    pub catch_up_released: u64,
}

/// egui overlay drawn on top of the projected frame.
pub struct Hud {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    pub visible: bool,
}

impl Hud {
    pub fn new(window: &Window, gfx: &GfxContext) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(ctx.clone(), ctx.viewport_id(), window, None, None);
        let renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);
        Self {
            ctx,
            state,
            renderer,
            visible: true,
        }
    }

    /// Returns `true` if egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn draw(
        &mut self,
        window: &Window,
        gfx: &GfxContext,
        view: &wgpu::TextureView,
        stats: &HudStats,
    ) {
        let input = self.state.take_egui_input(window);
        self.ctx.begin_frame(input);
        if self.visible {
            draw_hud(&self.ctx, stats);
        }
        let output = self.ctx.end_frame();
        self.state
            .handle_platform_output(window, output.platform_output);

        let shapes = self
            .ctx
            .tessellate(output.shapes, self.ctx.pixels_per_point());
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gfx.config.width, gfx.config.height],
            pixels_per_point: self.ctx.pixels_per_point(),
        };

        let mut encoder = gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &output.textures_delta.set {
            self.renderer
                .update_texture(&gfx.device, &gfx.queue, *id, delta);
        }

        self.renderer.update_buffers(
            &gfx.device,
            &gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}

pub fn draw_hud(ctx: &egui::Context, stats: &HudStats) {
    egui::Window::new("Stream")
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            egui::Grid::new("stream_stats")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui| {
                    ui.label("Compositor");
                    ui.monospace(format!("{:?}", stats.state));
                    ui.end_row();

                    ui.label("Player");
                    ui.monospace(format!("{:?}", stats.player));
                    ui.end_row();

                    ui.label("Mesh");
                    ui.monospace(match stats.mesh {
                        Some(kind) => format!("{kind:?}"),
                        None => "pending".to_owned(),
                    });
                    ui.end_row();

                    ui.label("Decode / display");
                    ui.monospace(format!(
                        "{} / {}",
                        stats.counters.decode_advance, stats.counters.display_advance
                    ));
                    ui.end_row();

                    ui.label("Draw ticks");
                    ui.monospace(stats.counters.draw_tick.to_string());
                    ui.end_row();

                    ui.label("Last tick");
                    ui.monospace(match stats.outcome {
                        Some(TickOutcome::Drawn { composed: true }) => "drawn + composed".to_owned(),
                        Some(other) => format!("{other:?}"),
                        None => "-".to_owned(),
                    });
                    ui.end_row();

                    ui.label("Frames produced");
                    ui.monospace(stats.frames_produced.to_string());
                    ui.end_row();

                    ui.label("Catch-up released");
                    ui.monospace(stats.catch_up_released.to_string());
                    ui.end_row();

                    ui.label("Eye");
                    ui.monospace(format!("{:?}", stats.eye));
                    ui.end_row();

                    ui.label("Yaw / pitch");
                    ui.monospace(format!("{:.1}° / {:.1}°", stats.yaw_deg, stats.pitch_deg));
                    ui.end_row();
                });
            ui.separator();
            ui.small("Drag to look · Space pause · E eye · H hide");
        });
}
