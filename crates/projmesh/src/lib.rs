//! projmesh: CPU-side projection geometry for immersive video.
//!
//! - `equirect`: latitude/longitude triangle-strip sphere patch with
//!   per-eye UV pairs (mono, left-right, top-bottom).
//! - `cubemap`: fixed 36-vertex unit cube carrying a second "sampling
//!   direction" attribute next to its position.
//! - `face`: bitstream face transform codes and the in-place correction of
//!   the cube's sampling attribute.
//!
//! Nothing in here touches the GPU. Buffers are returned as plain `Vec`s /
//! arrays of `bytemuck::Pod` structs; uploading them is the caller's job.

pub mod cubemap;
pub mod equirect;
pub mod face;

pub use cubemap::{CubeVertex, CubemapGeometry, CUBE_VERTEX_COUNT, VERTICES_PER_FACE};
pub use equirect::{build_equirect, EquirectGeometry, EquirectParams, EquirectVertex, StereoMode};
pub use face::{apply_face_transforms, CubeFace, FaceTransform, FaceTransformCodes};

/// Errors produced while building or correcting projection geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid geometry parameters: {0}")]
    InvalidParameters(String),
    #[error("unknown face transform code {0} (expected 0..=7)")]
    UnknownTransformCode(i32),
}

/// Which projection a piece of geometry was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Equirect,
    Cubemap,
}

/// Vertex data for one of the two supported projections.
#[derive(Debug, Clone)]
pub enum Geometry {
    Equirect(EquirectGeometry),
    Cubemap(CubemapGeometry),
}

impl Geometry {
    #[inline]
    pub fn kind(&self) -> ProjectionKind {
        match self {
            Geometry::Equirect(_) => ProjectionKind::Equirect,
            Geometry::Cubemap(_) => ProjectionKind::Cubemap,
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Equirect(g) => g.vertices().len(),
            Geometry::Cubemap(_) => CUBE_VERTEX_COUNT,
        }
    }
}
