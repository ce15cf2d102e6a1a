//! GPU resource seam used by the registry and the compositor.
//!
//! Everything behind this trait runs on the render thread. The wgpu
//! implementation lives in [`crate::renderer`]; tests supply a recording one.

use crate::engine::ProjectionFormat;
use crate::surfaces::DecodedImage;
use glam::Mat4;
use projmesh::{CubemapGeometry, Geometry};

/// Opaque id of a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

impl TextureHandle {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque id of an uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(u32);

impl MeshHandle {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Single 2D layer.
    Flat,
    /// Six square layers in +X, -X, +Y, -Y, +Z, -Z order.
    Cube,
}

impl TextureKind {
    #[inline]
    pub fn layers(self) -> u32 {
        match self {
            TextureKind::Flat => 1,
            TextureKind::Cube => 6,
        }
    }

    /// Display texture kind a mesh of `format` samples from.
    #[inline]
    pub fn for_projection(format: ProjectionFormat) -> Self {
        match format {
            ProjectionFormat::Equirect => TextureKind::Flat,
            ProjectionFormat::Cubemap => TextureKind::Cube,
        }
    }
}

/// Which eye a draw is for. Picks the UV pair of stereo equirect meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Eye {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    pub view_proj: Mat4,
    pub eye: Eye,
}

pub trait RenderBackend {
    /// Allocates a texture. For `Cube`, `width`/`height` are the face size.
    fn create_texture(&mut self, kind: TextureKind, width: u32, height: u32, label: &str)
        -> TextureHandle;

    /// Reallocates the storage behind `texture`, keeping its handle.
    fn resize_texture(&mut self, texture: TextureHandle, kind: TextureKind, width: u32, height: u32);

    /// Uploads `image` into one layer of `texture`.
    fn write_texture(&mut self, texture: TextureHandle, layer: u32, image: &DecodedImage);

    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Uploads vertex data and binds it to `texture` for sampling.
    fn upload_mesh(&mut self, geometry: &Geometry, texture: TextureHandle)
        -> crate::Result<MeshHandle>;

    /// Re-uploads the sampling attribute of a cubemap mesh.
    fn update_sampling(&mut self, mesh: MeshHandle, geometry: &CubemapGeometry);

    fn destroy_mesh(&mut self, mesh: MeshHandle);

    fn draw_mesh(&mut self, mesh: MeshHandle, params: &DrawParams);

    /// Pops the oldest error reported by the GPU error channel.
    fn take_error(&mut self) -> Option<String>;
}
