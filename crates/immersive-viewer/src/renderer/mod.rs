//! wgpu implementation of [`RenderBackend`]. Owns the GPU context, the
//! texture table, uploaded meshes and both projection pipelines.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{cubemap::CubemapPipeline, equirect::EquirectPipeline, MeshUniform},
    targets::TextureTable,
};
use crate::backend::{DrawParams, Eye, MeshHandle, RenderBackend, TextureHandle, TextureKind};
use crate::engine::ProjectionFormat;
use crate::surfaces::{DecodedImage, BYTES_PER_PIXEL};
use crate::ViewerError;
use projmesh::{CubemapGeometry, Geometry};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

struct GpuMesh {
    kind: ProjectionFormat,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    uniform_buffer: wgpu::Buffer,
    texture: TextureHandle,
}

/// Swap-chain view the current frame draws into.
struct FrameTarget {
    view: wgpu::TextureView,
    cleared: bool,
}

pub struct WgpuBackend {
    pub gfx: GfxContext,
    textures: TextureTable,
    meshes: HashMap<MeshHandle, GpuMesh>,
    next_mesh: u32,
    equirect: EquirectPipeline,
    cubemap: CubemapPipeline,
    sampler: wgpu::Sampler,
    frame: Option<FrameTarget>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let color_fmt = gfx.config.format;

        let equirect = EquirectPipeline::new(&gfx.device, color_fmt);
        let cubemap = CubemapPipeline::new(&gfx.device, color_fmt);

        let sampler = gfx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            gfx,
            textures: TextureTable::new(),
            meshes: HashMap::new(),
            next_mesh: 0,
            equirect,
            cubemap,
            sampler,
            frame: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
    }

    /// Sets the swap-chain view that subsequent draws render into.
    pub fn begin_frame(&mut self, view: wgpu::TextureView) {
        self.frame = Some(FrameTarget {
            view,
            cleared: false,
        });
    }

    /// Clears the frame if nothing was drawn and hands the view back for overlays.
    pub fn end_frame(&mut self) -> Option<wgpu::TextureView> {
        let frame = self.frame.take()?;
        if !frame.cleared {
            let mut encoder = self
                .gfx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Clear Encoder"),
                });
            {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Clear Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            }
            self.gfx.queue.submit(std::iter::once(encoder.finish()));
        }
        Some(frame.view)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

impl RenderBackend for WgpuBackend {
    fn create_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        label: &str,
    ) -> TextureHandle {
        self.textures
            .create(&self.gfx.device, kind, width, height, label)
    }

    fn resize_texture(&mut self, texture: TextureHandle, kind: TextureKind, width: u32, height: u32) {
        if !self
            .textures
            .resize(&self.gfx.device, texture, kind, width, height)
        {
            self.gfx
                .report_error(format!("resize of unknown texture {texture:?}"));
        }
    }

    fn write_texture(&mut self, texture: TextureHandle, layer: u32, image: &DecodedImage) {
        let Some(target) = self.textures.get(texture) else {
            self.gfx
                .report_error(format!("write to unknown texture {texture:?}"));
            return;
        };
        if image.width() != target.width
            || image.height() != target.height
            || layer >= target.kind.layers()
        {
            self.gfx.report_error(format!(
                "write of {}x{} layer {layer} into {}x{} {:?} texture {texture:?}",
                image.width(),
                image.height(),
                target.width,
                target.height,
                target.kind
            ));
            return;
        }

        self.gfx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width() * BYTES_PER_PIXEL as u32),
                rows_per_image: Some(image.height()),
            },
            wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.destroy(texture);
    }

    fn upload_mesh(&mut self, geometry: &Geometry, texture: TextureHandle) -> crate::Result<MeshHandle> {
        if self.textures.get(texture).is_none() {
            return Err(ViewerError::Gpu(format!(
                "mesh bound to unknown texture {texture:?}"
            )));
        }

        let contents: Vec<u8> = match geometry {
            Geometry::Equirect(g) => bytemuck::cast_slice(g.vertices()).to_vec(),
            Geometry::Cubemap(g) => bytemuck::cast_slice(&g.vertices()).to_vec(),
        };
        let vertex_buffer = self
            .gfx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Projection Mesh VB"),
                contents: &contents,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_buffer = self.gfx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Projection Mesh UBO"),
            size: std::mem::size_of::<MeshUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.next_mesh += 1;
        let handle = MeshHandle::from_raw(self.next_mesh);
        self.meshes.insert(
            handle,
            GpuMesh {
                kind: geometry.kind(),
                vertex_buffer,
                vertex_count: geometry.vertex_count() as u32,
                uniform_buffer,
                texture,
            },
        );
        Ok(handle)
    }

    fn update_sampling(&mut self, mesh: MeshHandle, geometry: &CubemapGeometry) {
        match self.meshes.get(&mesh) {
            Some(gpu) if gpu.kind == ProjectionFormat::Cubemap => {
                self.gfx.queue.write_buffer(
                    &gpu.vertex_buffer,
                    0,
                    bytemuck::cast_slice(&geometry.vertices()),
                );
            }
            _ => self
                .gfx
                .report_error(format!("sampling update for non-cubemap mesh {mesh:?}")),
        }
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if let Some(gpu) = self.meshes.remove(&mesh) {
            gpu.vertex_buffer.destroy();
            gpu.uniform_buffer.destroy();
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, params: &DrawParams) {
        let Some(frame) = self.frame.as_mut() else {
            log::trace!("Draw outside of a frame ignored.");
            return;
        };
        let Some(gpu) = self.meshes.get(&mesh) else {
            self.gfx.report_error(format!("draw of unknown mesh {mesh:?}"));
            return;
        };
        let Some(texture) = self.textures.get(gpu.texture) else {
            self.gfx
                .report_error(format!("mesh {mesh:?} samples a destroyed texture"));
            return;
        };

        let (pipeline, layout) = match gpu.kind {
            ProjectionFormat::Equirect => (&self.equirect.pipeline, &self.equirect.mesh_layout),
            ProjectionFormat::Cubemap => (&self.cubemap.pipeline, &self.cubemap.mesh_layout),
        };

        let uniform = MeshUniform {
            view_proj: params.view_proj.to_cols_array_2d(),
            eye: match params.eye {
                Eye::Left => 0,
                Eye::Right => 1,
            },
            _pad: [0; 3],
        };
        self.gfx
            .queue
            .write_buffer(&gpu.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        // The display texture may have been reallocated since the last draw.
        let bind_group = self.gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Projection Mesh Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: gpu.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Projection Encoder"),
            });
        {
            let load = if frame.cleared {
                wgpu::LoadOp::Load
            } else {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Projection Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
            pass.draw(0..gpu.vertex_count, 0..1);
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        frame.cleared = true;
    }

    fn take_error(&mut self) -> Option<String> {
        self.gfx.take_error()
    }
}
