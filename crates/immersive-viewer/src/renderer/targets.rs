//! Decode and display textures, addressed by `TextureHandle`.

use crate::backend::{TextureHandle, TextureKind};
use std::collections::HashMap;

/// Decoded frames arrive as sRGB-encoded RGBA8.
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub struct GpuTexture {
    // Keep alive for the lifetime of the view.
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub kind: TextureKind,
    /// Per-layer size.
    pub width: u32,
    pub height: u32,
    label: String,
}

impl GpuTexture {
    fn allocate(device: &wgpu::Device, kind: TextureKind, width: u32, height: u32, label: String) -> Self {
        // Ensure non‑zero dimensions.
        let width = width.max(1);
        let height = height.max(1);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: kind.layers(),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&label),
            dimension: Some(match kind {
                TextureKind::Flat => wgpu::TextureViewDimension::D2,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });

        Self {
            texture,
            view,
            kind,
            width,
            height,
            label,
        }
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

#[derive(Default)]
pub struct TextureTable {
    next_id: u32,
    entries: HashMap<TextureHandle, GpuTexture>,
}

impl TextureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        device: &wgpu::Device,
        kind: TextureKind,
        width: u32,
        height: u32,
        label: &str,
    ) -> TextureHandle {
        self.next_id += 1;
        let handle = TextureHandle::from_raw(self.next_id);
        self.entries
            .insert(handle, GpuTexture::allocate(device, kind, width, height, label.to_owned()));
        handle
    }

    /// Replaces the storage behind `handle`. Returns `false` for unknown handles.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        handle: TextureHandle,
        kind: TextureKind,
        width: u32,
        height: u32,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        let label = std::mem::take(&mut entry.label);
        let old = std::mem::replace(entry, GpuTexture::allocate(device, kind, width, height, label));
        old.texture.destroy();
        true
    }

    #[inline]
    pub fn get(&self, handle: TextureHandle) -> Option<&GpuTexture> {
        self.entries.get(&handle)
    }

    /// Destroys the texture behind `handle`, if any.
    pub fn destroy(&mut self, handle: TextureHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(entry) => {
                entry.texture.destroy();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
