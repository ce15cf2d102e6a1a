//! Stand-in streaming engine for the demo binary.
//!
//! A background thread "decodes" grid test patterns for every tile at a fixed
//! interval and queues them on the decode surfaces, occasionally together
//! with a finer-grained catch-up image for tile 0. Compositing stitches the
//! most recent tiles side by side into the display surface.

use crate::engine::{EngineStatus, PlayerStatus, ProjectionFormat, StreamEngine};
use crate::pose::PoseSample;
use crate::surfaces::{DecodeSurface, DecodeTargetId, DecodedImage, DisplaySurface, BYTES_PER_PIXEL};
use anyhow::{bail, Context};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const TILE_COLORS: [[u8; 4]; 5] = [
    [200, 60, 60, 255],
    [60, 170, 70, 255],
    [60, 90, 200, 255],
    [210, 180, 50, 255],
    [160, 70, 190, 255],
];
const GRID_COLOR: [u8; 4] = [20, 20, 20, 255];
const SWEEP_COLOR: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub projection: ProjectionFormat,
    pub frame_size: (u32, u32),
    pub tiles: usize,
    /// Produce a catch-up image every N frames, `None` to disable.
    pub catch_up_every: Option<NonZeroU32>,
    pub frame_interval: Duration,
    pub face_codes: [i32; 6],
}

#[derive(Debug, Default)]
struct Produced {
    count: u64,
    tiles: Vec<DecodedImage>,
    catch_up: Option<DecodedImage>,
}

#[derive(Debug, Default)]
struct Production {
    produced: Mutex<Produced>,
    stop: AtomicBool,
    paused: AtomicBool,
}

pub struct SyntheticEngine {
    config: SyntheticConfig,
    status: PlayerStatus,
    decoders: Vec<DecodeSurface>,
    catch_up: Option<DecodeSurface>,
    display: Option<DisplaySurface>,
    production: Arc<Production>,
    worker: Option<JoinHandle<()>>,
    last_pose: Option<(PoseSample, u64)>,
    released: u64,
}

impl SyntheticEngine {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            status: PlayerStatus::Ready,
            decoders: Vec::new(),
            catch_up: None,
            display: None,
            production: Arc::new(Production::default()),
            worker: None,
            last_pose: None,
            released: 0,
        }
    }

    /// Hands the engine its decode surfaces, index 0 first.
    pub fn open(&mut self, decoders: Vec<DecodeSurface>, catch_up: Option<DecodeSurface>) {
        info!(
            "Synthetic stream opened: {} tile(s), catch-up {}.",
            decoders.len(),
            if catch_up.is_some() { "on" } else { "off" }
        );
        self.decoders = decoders;
        self.catch_up = catch_up;
    }

    pub fn attach_display(&mut self, display: DisplaySurface) {
        self.display = Some(display);
    }

    /// Spawns the decoder thread and switches to `Playing`.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        if self.decoders.is_empty() {
            bail!("synthetic engine started without decode surfaces");
        }

        let production = Arc::clone(&self.production);
        let decoders = self.decoders.clone();
        let catch_up = self.catch_up.clone();
        let every = self.config.catch_up_every;
        let interval = self.config.frame_interval;

        let worker = std::thread::Builder::new()
            .name("synthetic-decoder".into())
            .spawn(move || run_decoder(&production, &decoders, catch_up.as_ref(), every, interval))
            .context("failed to spawn decoder thread")?;

        self.worker = Some(worker);
        self.status = PlayerStatus::Playing;
        Ok(())
    }

    pub fn toggle_pause(&mut self) {
        self.status = match self.status {
            PlayerStatus::Playing => PlayerStatus::Paused,
            PlayerStatus::Paused => PlayerStatus::Playing,
            other => other,
        };
        self.production
            .paused
            .store(self.status == PlayerStatus::Paused, Ordering::Release);
        info!("Synthetic stream {:?}.", self.status);
    }

    /// Stops the decoder thread. The engine reports `Stopped` afterwards.
    pub fn stop(&mut self) {
        self.production.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Decoder thread panicked.");
            }
        }
        self.status = PlayerStatus::Stopped;
    }

    pub fn frames_produced(&self) -> u64 {
        self.production.produced.lock().count
    }

    pub fn catch_up_released(&self) -> u64 {
        self.released
    }

    pub fn last_pose(&self) -> Option<(PoseSample, u64)> {
        self.last_pose
    }
}

impl Drop for SyntheticEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl StreamEngine for SyntheticEngine {
    fn status(&self) -> PlayerStatus {
        self.status
    }

    fn release_texture(&mut self, target: DecodeTargetId) {
        self.released += 1;
        trace!("{target} returned to the decoder ({} total).", self.released);
    }

    fn compose_display_frame(&mut self, frame_index: u64) -> EngineStatus {
        let Some(display) = self.display.as_ref() else {
            return EngineStatus::NotReady;
        };

        let frame = {
            let produced = self.production.produced.lock();
            if produced.count <= frame_index || produced.tiles.is_empty() {
                return EngineStatus::NotReady;
            }
            let (w, h) = display.size();
            merge_tiles(w, h, &produced.tiles, produced.catch_up.as_ref())
        };

        match display.present(frame) {
            Ok(()) => EngineStatus::Done,
            Err(err) => {
                debug!("Compose of frame {frame_index} dropped: {err}");
                EngineStatus::NotReady
            }
        }
    }

    fn projection_format(&self) -> ProjectionFormat {
        self.config.projection
    }

    fn frame_dimensions(&self) -> (u32, u32) {
        self.config.frame_size
    }

    fn face_transform_codes(&self) -> Option<[i32; 6]> {
        match self.config.projection {
            ProjectionFormat::Cubemap => Some(self.config.face_codes),
            ProjectionFormat::Equirect => None,
        }
    }

    fn set_viewport_pose(&mut self, pose: PoseSample, timestamp: u64) {
        self.last_pose = Some((pose, timestamp));
    }

    fn shutdown(&mut self) {
        self.stop();
    }
}

fn run_decoder(
    production: &Production,
    decoders: &[DecodeSurface],
    catch_up: Option<&DecodeSurface>,
    catch_up_every: Option<NonZeroU32>,
    interval: Duration,
) {
    let mut frame = 0u64;
    while !production.stop.load(Ordering::Acquire) {
        let started = Instant::now();

        if !production.paused.load(Ordering::Acquire) {
            let tiles: Vec<DecodedImage> = decoders
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let (w, h) = s.size();
                    tile_pattern(w, h, i, frame, false)
                })
                .collect();
            let upgrade = catch_up
                .filter(|_| catch_up_due(frame, catch_up_every))
                .map(|s| {
                    let (w, h) = s.size();
                    tile_pattern(w, h, 0, frame, true)
                });

            {
                let mut produced = production.produced.lock();
                produced.tiles = tiles.clone();
                produced.catch_up = upgrade.clone();
                produced.count = frame + 1;
            }

            // Peers first; the leader's edge latches the whole group.
            for (surface, image) in decoders.iter().zip(tiles).rev() {
                if let Err(err) = surface.queue_frame(image) {
                    debug!("Decoder for {} stopping: {err}", surface.id());
                    return;
                }
            }
            if let (Some(surface), Some(image)) = (catch_up, upgrade) {
                if let Err(err) = surface.queue_frame(image) {
                    debug!("Catch-up decoder stopping: {err}");
                    return;
                }
            }
            frame += 1;
        }

        std::thread::sleep(interval.saturating_sub(started.elapsed()));
    }
}

fn catch_up_due(frame: u64, every: Option<NonZeroU32>) -> bool {
    every.is_some_and(|k| frame % u64::from(k.get()) == 0)
}

/// Grid pattern in the tile's colour with a horizontal bar that moves down
/// one step per frame. Catch-up images use a finer grid.
pub fn tile_pattern(width: u32, height: u32, tile: usize, frame: u64, upgraded: bool) -> DecodedImage {
    let mut image = DecodedImage::filled(width, height, GRID_COLOR);
    let base = TILE_COLORS[tile % TILE_COLORS.len()];
    let cell = if upgraded { 16 } else { 64 };
    let sweep = ((frame * 4) % height.max(1) as u64) as usize;
    let row_bytes = (width as usize * BYTES_PER_PIXEL).max(1);

    image
        .pixels_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let rgba = if y == sweep {
                    SWEEP_COLOR
                } else if x % cell == 0 || y % cell == 0 {
                    GRID_COLOR
                } else {
                    base
                };
                px.copy_from_slice(&rgba);
            }
        });
    image
}

/// Places tiles left to right; a catch-up image replaces tile 0.
pub fn merge_tiles(
    width: u32,
    height: u32,
    tiles: &[DecodedImage],
    upgrade: Option<&DecodedImage>,
) -> DecodedImage {
    let mut frame = DecodedImage::filled(width, height, [0, 0, 0, 255]);
    let mut x = 0;
    for (i, tile) in tiles.iter().enumerate() {
        let source = match upgrade {
            Some(up) if i == 0 => up,
            _ => tile,
        };
        frame.blit(source, x, 0);
        x += tile.width();
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyntheticConfig {
        SyntheticConfig {
            projection: ProjectionFormat::Cubemap,
            frame_size: (6, 4),
            tiles: 2,
            catch_up_every: NonZeroU32::new(2),
            frame_interval: Duration::from_millis(5),
            face_codes: [2, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn pattern_has_grid_and_sweep() {
        let img = tile_pattern(130, 70, 1, 0, false);
        assert_eq!((img.width(), img.height()), (130, 70));
        assert_eq!(img.pixel(0, 5), Some(GRID_COLOR));
        assert_eq!(img.pixel(5, 0), Some(SWEEP_COLOR));
        assert_eq!(img.pixel(5, 5), Some(TILE_COLORS[1]));
        assert_eq!(img.pixel(64, 5), Some(GRID_COLOR));

        let fine = tile_pattern(130, 70, 1, 0, true);
        assert_eq!(fine.pixel(16, 5), Some(GRID_COLOR));
    }

    #[test]
    fn merge_places_tiles_side_by_side() {
        let tiles = [
            DecodedImage::filled(2, 2, [1, 0, 0, 255]),
            DecodedImage::filled(2, 2, [2, 0, 0, 255]),
        ];
        let frame = merge_tiles(5, 2, &tiles, None);
        assert_eq!(frame.pixel(1, 1), Some([1, 0, 0, 255]));
        assert_eq!(frame.pixel(3, 0), Some([2, 0, 0, 255]));
        assert_eq!(frame.pixel(4, 0), Some([0, 0, 0, 255]));

        let upgrade = DecodedImage::filled(2, 2, [9, 9, 9, 255]);
        let frame = merge_tiles(4, 2, &tiles, Some(&upgrade));
        assert_eq!(frame.pixel(0, 0), Some([9, 9, 9, 255]));
        assert_eq!(frame.pixel(2, 0), Some([2, 0, 0, 255]));
    }

    #[test]
    fn catch_up_cadence() {
        let every = NonZeroU32::new(3);
        let due: Vec<u64> = (0..10).filter(|&f| catch_up_due(f, every)).collect();
        assert_eq!(due, vec![0, 3, 6, 9]);
        assert!((0..10).all(|f| catch_up_due(f, NonZeroU32::new(1))));
        assert!(!catch_up_due(0, None));
    }

    #[test]
    fn lifecycle_and_metadata() {
        let mut engine = SyntheticEngine::new(config());
        assert_eq!(engine.status(), PlayerStatus::Ready);
        assert!(engine.start().is_err());
        assert_eq!(engine.face_transform_codes(), Some([2, 0, 0, 0, 0, 0]));
        assert_eq!(engine.frame_dimensions(), (6, 4));
        assert_eq!(engine.compose_display_frame(0), EngineStatus::NotReady);

        engine.set_viewport_pose(PoseSample::new(10.0, 5.0), 3);
        assert_eq!(engine.last_pose().map(|(_, ts)| ts), Some(3));

        engine.shutdown();
        assert_eq!(engine.status(), PlayerStatus::Stopped);
    }

    #[test]
    fn equirect_streams_signal_no_face_codes() {
        let engine = SyntheticEngine::new(SyntheticConfig {
            projection: ProjectionFormat::Equirect,
            ..config()
        });
        assert_eq!(engine.face_transform_codes(), None);
    }
}
