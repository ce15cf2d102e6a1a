use projmesh::GeometryError;

/// Errors surfaced by the surface registry and the compositor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    /// Graphics context or decoder not initialised yet. Retry next tick.
    #[error("graphics context not ready")]
    NotReady,

    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),

    /// Display advance would overtake decode advance.
    #[error("display advance {display} would exceed decode advance {decode}")]
    InconsistentCounters { decode: u64, display: u64 },

    #[error("decode target index {index} out of range (capacity {capacity})")]
    TargetOutOfRange { index: usize, capacity: usize },

    #[error("frame is {got_width}x{got_height}, surface expects {width}x{height}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("surface closed")]
    SurfaceClosed,

    #[error("GPU error: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
