//! Decode and display targets.
//!
//! The registry owns every texture the decoders write into. Decoder threads
//! only ever see [`DecodeSurface`] / [`DisplaySurface`] handles: they queue
//! CPU images and raise frame-available flags, and the render thread latches
//! those images into GPU textures when the compositor asks for it.
//!
//! Frame-available flags are level-triggered and cleared by test-and-clear.
//! Several frames queued between two compositor ticks collapse into a single
//! consumption; only the newest image per target is kept.

use crate::backend::{RenderBackend, TextureHandle, TextureKind};
use crate::engine::{EngineStatus, ProjectionFormat};
use crate::{Result, ViewerError};
use log::{debug, info, trace};
use parking_lot::Mutex;
use projmesh::GeometryError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Number of primary decode targets (parallel tiles/qualities).
pub const MAX_PRIMARY_TARGETS: usize = 5;
/// Decoded images are tightly packed RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

/// Cell `(column, row)` of each cube layer inside a 3x2 packed frame.
/// Layers run +X (right), -X (left), +Y (top), -Y (bottom), +Z (back), -Z (front).
const CUBE_FACE_CELLS: [(u32, u32); 6] = [(2, 0), (0, 0), (1, 1), (2, 1), (0, 1), (1, 0)];

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Validated decode target id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeTargetId(Slot);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Primary(u8),
    CatchUp,
}

impl DecodeTargetId {
    /// Primary group leader; its frames drive the primary flag.
    pub const LEADER: DecodeTargetId = DecodeTargetId(Slot::Primary(0));

    pub fn primary(index: usize) -> Result<Self> {
        if index >= MAX_PRIMARY_TARGETS {
            return Err(ViewerError::TargetOutOfRange {
                index,
                capacity: MAX_PRIMARY_TARGETS,
            });
        }
        Ok(Self(Slot::Primary(index as u8)))
    }

    #[inline]
    pub const fn catch_up() -> Self {
        Self(Slot::CatchUp)
    }

    #[inline]
    pub fn is_catch_up(self) -> bool {
        self.0 == Slot::CatchUp
    }

    #[inline]
    pub fn is_leader(self) -> bool {
        self == Self::LEADER
    }

    #[inline]
    pub fn primary_index(self) -> Option<usize> {
        match self.0 {
            Slot::Primary(i) => Some(i as usize),
            Slot::CatchUp => None,
        }
    }

    #[inline]
    pub fn group(self) -> TargetGroup {
        match self.0 {
            Slot::Primary(_) => TargetGroup::Primary,
            Slot::CatchUp => TargetGroup::CatchUp,
        }
    }
}

impl fmt::Display for DecodeTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Slot::Primary(i) => write!(f, "primary[{i}]"),
            Slot::CatchUp => f.write_str("catch-up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetGroup {
    Primary,
    CatchUp,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// CPU-side RGBA8 image, as produced by a decoder or the compose step.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            let row = (width as usize * BYTES_PER_PIXEL).max(1);
            return Err(ViewerError::FrameSizeMismatch {
                width,
                height,
                got_width: width,
                got_height: (pixels.len() / row) as u32,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Copies a sub-rectangle, clipped to the image bounds.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> DecodedImage {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in y..y + height {
            let start = (row as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            pixels.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        DecodedImage {
            width,
            height,
            pixels,
        }
    }

    /// Copies `src` into this image with its top-left corner at `(x, y)`,
    /// clipped to the image bounds.
    pub fn blit(&mut self, src: &DecodedImage, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let cols = src.width.min(self.width - x) as usize;
        let rows = src.height.min(self.height - y);
        let row_bytes = cols * BYTES_PER_PIXEL;
        for row in 0..rows {
            let dst = ((y + row) as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            let from = row as usize * src.width as usize * BYTES_PER_PIXEL;
            self.pixels[dst..dst + row_bytes].copy_from_slice(&src.pixels[from..from + row_bytes]);
        }
    }
}

fn check_size(width: u32, height: u32, image: &DecodedImage) -> Result<()> {
    if image.width != width || image.height != height {
        return Err(ViewerError::FrameSizeMismatch {
            width,
            height,
            got_width: image.width,
            got_height: image.height,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared state between decoder threads and the render thread
// ---------------------------------------------------------------------------

/// Frame-available edges, set by decoder threads and test-and-cleared by the
/// render thread.
#[derive(Debug, Default)]
pub struct FrameFlags {
    primary: AtomicBool,
    catch_up: AtomicBool,
    closed: AtomicBool,
}

impl FrameFlags {
    #[inline]
    fn flag(&self, group: TargetGroup) -> &AtomicBool {
        match group {
            TargetGroup::Primary => &self.primary,
            TargetGroup::CatchUp => &self.catch_up,
        }
    }

    pub fn raise(&self, group: TargetGroup) {
        self.flag(group).store(true, Ordering::Release);
    }

    /// Clears the flag and reports whether it was set.
    pub fn take(&self, group: TargetGroup) -> bool {
        self.flag(group).swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self, group: TargetGroup) -> bool {
        self.flag(group).load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct QueuedFrames {
    primary: [Option<DecodedImage>; MAX_PRIMARY_TARGETS],
    catch_up: Option<DecodedImage>,
    display: Option<DecodedImage>,
}

impl QueuedFrames {
    fn slot_mut(&mut self, id: DecodeTargetId) -> &mut Option<DecodedImage> {
        match id.0 {
            Slot::Primary(i) => &mut self.primary[i as usize],
            Slot::CatchUp => &mut self.catch_up,
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceShared {
    flags: FrameFlags,
    queued: Mutex<QueuedFrames>,
}

// ---------------------------------------------------------------------------
// Producer handles
// ---------------------------------------------------------------------------

/// Decoder-side handle of one decode target. Never touches the GPU.
#[derive(Debug, Clone)]
pub struct DecodeSurface {
    id: DecodeTargetId,
    width: u32,
    height: u32,
    shared: Arc<SurfaceShared>,
}

impl DecodeSurface {
    #[inline]
    pub fn id(&self) -> DecodeTargetId {
        self.id
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Queues a decoded image, replacing any image not yet latched.
    pub fn queue_frame(&self, image: DecodedImage) -> Result<()> {
        check_size(self.width, self.height, &image)?;
        {
            let mut queued = self.shared.queued.lock();
            if self.shared.flags.is_closed() {
                return Err(ViewerError::SurfaceClosed);
            }
            *queued.slot_mut(self.id) = Some(image);
        }

        // Non-leader primaries are latched together with the leader.
        if self.id.is_leader() || self.id.is_catch_up() {
            self.shared.flags.raise(self.id.group());
        }
        Ok(())
    }
}

/// Compose-side handle of the display target.
#[derive(Debug, Clone)]
pub struct DisplaySurface {
    width: u32,
    height: u32,
    shared: Arc<SurfaceShared>,
}

impl DisplaySurface {
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Presents a merged frame; the registry latches it after a successful compose.
    pub fn present(&self, image: DecodedImage) -> Result<()> {
        check_size(self.width, self.height, &image)?;
        let mut queued = self.shared.queued.lock();
        if self.shared.flags.is_closed() {
            return Err(ViewerError::SurfaceClosed);
        }
        queued.display = Some(image);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeTarget {
    pub id: DecodeTargetId,
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
    latched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTarget {
    pub texture: TextureHandle,
    pub kind: TextureKind,
    /// Size of the composed frame, not of the texture layers.
    pub width: u32,
    pub height: u32,
}

/// Returned by [`SurfaceRegistry::create_decode_target`].
#[derive(Debug, Clone)]
pub struct DecodeTargetBinding {
    pub texture: TextureHandle,
    pub surface: DecodeSurface,
}

#[derive(Debug, Clone, Copy)]
struct FixedTextures {
    primary: [TextureHandle; MAX_PRIMARY_TARGETS],
    catch_up: TextureHandle,
    display: TextureHandle,
}

impl FixedTextures {
    fn for_target(&self, id: DecodeTargetId) -> TextureHandle {
        match id.0 {
            Slot::Primary(i) => self.primary[i as usize],
            Slot::CatchUp => self.catch_up,
        }
    }

    fn all(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.primary
            .iter()
            .copied()
            .chain([self.catch_up, self.display])
    }
}

pub struct SurfaceRegistry {
    shared: Arc<SurfaceShared>,
    fixed: Option<FixedTextures>,
    primaries: [Option<DecodeTarget>; MAX_PRIMARY_TARGETS],
    catch_up: Option<DecodeTarget>,
    display: Option<DisplayTarget>,
    shut_down: bool,
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SurfaceShared::default()),
            fixed: None,
            primaries: [None; MAX_PRIMARY_TARGETS],
            catch_up: None,
            display: None,
            shut_down: false,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.fixed.is_some() && !self.shut_down
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    #[inline]
    pub fn flags(&self) -> &FrameFlags {
        &self.shared.flags
    }

    /// Allocates the fixed texture set. Repeated calls are ignored.
    pub fn on_graphics_context_ready<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.fixed.is_some() || self.shut_down {
            return;
        }

        let primary = std::array::from_fn(|i| {
            backend.create_texture(TextureKind::Flat, 1, 1, &format!("Decode Target {i}"))
        });
        let catch_up = backend.create_texture(TextureKind::Flat, 1, 1, "Catch-up Target");
        let display = backend.create_texture(TextureKind::Flat, 1, 1, "Display Target");

        self.fixed = Some(FixedTextures {
            primary,
            catch_up,
            display,
        });
        info!(
            "Graphics context ready: {} decode textures, 1 catch-up, 1 display.",
            MAX_PRIMARY_TARGETS
        );
    }

    fn require_ready(&self) -> Result<FixedTextures> {
        if self.shut_down {
            return Err(ViewerError::SurfaceClosed);
        }
        self.fixed.ok_or_else(|| {
            debug!("Surface requested before the graphics context is ready.");
            ViewerError::NotReady
        })
    }

    /// Binds decode target `id` at `width`x`height` and returns its producer handle.
    pub fn create_decode_target<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        id: DecodeTargetId,
    ) -> Result<DecodeTargetBinding> {
        let fixed = self.require_ready()?;
        if width == 0 || height == 0 {
            return Err(GeometryError::InvalidParameters(format!(
                "decode target {id} must be non-empty, got {width}x{height}"
            ))
            .into());
        }

        let texture = fixed.for_target(id);
        backend.resize_texture(texture, TextureKind::Flat, width, height);

        let target = DecodeTarget {
            id,
            texture,
            width,
            height,
            latched: false,
        };
        match id.0 {
            Slot::Primary(i) => self.primaries[i as usize] = Some(target),
            Slot::CatchUp => self.catch_up = Some(target),
        }
        self.shared.queued.lock().slot_mut(id).take();

        info!("Decode target {id} bound at {width}x{height}.");

        Ok(DecodeTargetBinding {
            texture,
            surface: DecodeSurface {
                id,
                width,
                height,
                shared: Arc::clone(&self.shared),
            },
        })
    }

    /// Sizes the display texture for `format` and returns the compose-side handle.
    ///
    /// Cubemap frames must be a 3x2 grid of square faces.
    pub fn create_display_target<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        format: ProjectionFormat,
    ) -> Result<(TextureHandle, DisplaySurface)> {
        let fixed = self.require_ready()?;
        let (kind, tex_w, tex_h) = display_layout(format, width, height)?;

        backend.resize_texture(fixed.display, kind, tex_w, tex_h);
        self.display = Some(DisplayTarget {
            texture: fixed.display,
            kind,
            width,
            height,
        });
        self.shared.queued.lock().display = None;

        info!("Display target bound: {format:?} {width}x{height} ({kind:?} {tex_w}x{tex_h}).");

        Ok((
            fixed.display,
            DisplaySurface {
                width,
                height,
                shared: Arc::clone(&self.shared),
            },
        ))
    }

    /// Test-and-clear of the frame-available flag for `group`.
    #[inline]
    pub fn take_frame_edge(&self, group: TargetGroup) -> bool {
        self.shared.flags.take(group)
    }

    /// Latches every queued image of `group` into its texture.
    ///
    /// `NotReady` when no target of the group had anything queued.
    pub fn advance<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        group: TargetGroup,
    ) -> EngineStatus {
        let latched: Vec<(TextureHandle, DecodedImage)> = {
            let mut queued = self.shared.queued.lock();
            let targets = match group {
                TargetGroup::Primary => &self.primaries[..],
                TargetGroup::CatchUp => std::slice::from_ref(&self.catch_up),
            };
            targets
                .iter()
                .flatten()
                .filter_map(|t| queued.slot_mut(t.id).take().map(|img| (t.texture, img)))
                .collect()
        };

        if latched.is_empty() {
            trace!("{group:?} advance: nothing queued.");
            return EngineStatus::NotReady;
        }

        for (texture, image) in &latched {
            backend.write_texture(*texture, 0, image);
        }
        if group == TargetGroup::CatchUp {
            if let Some(target) = self.catch_up.as_mut() {
                target.latched = true;
            }
        }

        trace!("{group:?} advance: latched {} target(s).", latched.len());
        EngineStatus::Done
    }

    /// Latches the last presented display frame into the display texture.
    pub fn latch_display<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> EngineStatus {
        let Some(display) = self.display else {
            return EngineStatus::NotReady;
        };
        let Some(image) = self.shared.queued.lock().display.take() else {
            return EngineStatus::NotReady;
        };

        match display.kind {
            TextureKind::Flat => backend.write_texture(display.texture, 0, &image),
            TextureKind::Cube => {
                let face_w = display.width / 3;
                let face_h = display.height / 2;
                for (layer, (col, row)) in CUBE_FACE_CELLS.iter().enumerate() {
                    let face = image.crop(col * face_w, row * face_h, face_w, face_h);
                    backend.write_texture(display.texture, layer as u32, &face);
                }
            }
        }
        EngineStatus::Done
    }

    /// Drops the latched catch-up content and returns the target to hand back
    /// to the engine, or `None` if nothing is latched.
    pub fn release_catch_up(&mut self) -> Option<DecodeTargetId> {
        let target = self.catch_up.as_mut()?;
        if !target.latched {
            return None;
        }
        target.latched = false;
        Some(target.id)
    }

    #[inline]
    pub fn display_target(&self) -> Option<&DisplayTarget> {
        self.display.as_ref()
    }

    #[inline]
    pub fn display_texture(&self) -> Option<TextureHandle> {
        self.display.map(|d| d.texture)
    }

    pub fn decode_target(&self, id: DecodeTargetId) -> Option<&DecodeTarget> {
        match id.0 {
            Slot::Primary(i) => self.primaries[i as usize].as_ref(),
            Slot::CatchUp => self.catch_up.as_ref(),
        }
    }

    pub fn primary_count(&self) -> usize {
        self.primaries.iter().flatten().count()
    }

    /// Closes all producer handles and destroys every texture. Idempotent.
    pub fn shutdown<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        {
            let mut queued = self.shared.queued.lock();
            self.shared.flags.close();
            *queued = QueuedFrames::default();
        }

        if let Some(fixed) = self.fixed.take() {
            for texture in fixed.all() {
                backend.destroy_texture(texture);
            }
        }
        self.primaries = [None; MAX_PRIMARY_TARGETS];
        self.catch_up = None;
        self.display = None;

        info!("Surface registry shut down.");
    }
}

fn display_layout(format: ProjectionFormat, width: u32, height: u32) -> Result<(TextureKind, u32, u32)> {
    match format {
        ProjectionFormat::Equirect => {
            if width == 0 || height == 0 {
                return Err(GeometryError::InvalidParameters(format!(
                    "display frame must be non-empty, got {width}x{height}"
                ))
                .into());
            }
            Ok((TextureKind::Flat, width, height))
        }
        ProjectionFormat::Cubemap => {
            let square_faces = width > 0 && width % 3 == 0 && height % 2 == 0 && width / 3 == height / 2;
            if !square_faces {
                return Err(GeometryError::InvalidParameters(format!(
                    "cubemap frame {width}x{height} is not a 3x2 grid of square faces"
                ))
                .into());
            }
            Ok((TextureKind::Cube, width / 3, height / 2))
        }
    }
}
