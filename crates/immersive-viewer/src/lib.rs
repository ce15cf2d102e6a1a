//! Immersive 360° video viewer library.
//!
//! Synchronises several parallel decode targets (plus one catch-up target
//! for quality upgrades) into a single display texture, and renders it on an
//! equirectangular sphere or a face-corrected cube. The core (`surfaces`,
//! `pose`, `mesh`, `compositor`) is GPU-agnostic and talks to the GPU through
//! [`backend::RenderBackend`]; `renderer` provides the wgpu implementation.

pub mod app;
pub mod backend;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod error;
pub mod mesh;
pub mod pose;
pub mod renderer;
pub mod surfaces;
pub mod synthetic;
pub mod ui;

pub use backend::{DrawParams, Eye, MeshHandle, RenderBackend, TextureHandle, TextureKind};
pub use compositor::{
    Compositor, CompositorConfig, CompositorHandle, CompositorState, FrameCounters, TickOutcome,
};
pub use engine::{EngineStatus, PlayerStatus, ProjectionFormat, StreamEngine};
pub use error::{Result, ViewerError};
pub use mesh::{BoundMesh, UnboundMesh};
pub use pose::{PoseHistory, PoseSample};
pub use surfaces::{
    DecodeSurface, DecodeTargetBinding, DecodeTargetId, DecodedImage, DisplaySurface,
    SurfaceRegistry, TargetGroup, MAX_PRIMARY_TARGETS,
};
