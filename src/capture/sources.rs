//! # Capture Sources
//!
//! Concrete [`CameraDevice`] and [`FrameTicker`] implementations usable with
//! `ScanSession` outside a browser: a fixed-rate ticker standing in for the
//! display refresh, and a camera that replays still images from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use super::{CameraDevice, FacingMode, FrameTicker, MediaStream, PixelBuffer, ReadyState};
use crate::error::{StudioError, StudioResult};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// Fixed-rate ticker. Late ticks are skipped rather than bunched.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    /// Ticker at the given rate in Hz.
    pub fn with_rate(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / f64::from(hz.max(1))))
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::with_rate(60)
    }
}

#[async_trait]
impl FrameTicker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Camera that replays image files as consecutive frames.
///
/// Each read advances to the next image; the last one repeats, like a
/// camera pointed at a still scene. The facing preference is ignored.
#[derive(Debug, Clone)]
pub struct ImageSequenceCamera {
    paths: Vec<PathBuf>,
}

impl ImageSequenceCamera {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// Replay a single image file, or every image in a directory sorted by name.
    pub fn from_path(path: impl AsRef<Path>) -> StudioResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Ok(Self::new([path.to_path_buf()]));
        }

        let entries = std::fs::read_dir(path)
            .map_err(|e| StudioError::io_at("list frames", path.display().to_string(), e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry_path = entry
                .map_err(|e| StudioError::io_at("list frames", path.display().to_string(), e))?
                .path();
            let is_image = entry_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(entry_path);
            }
        }
        paths.sort();
        Ok(Self::new(paths))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[async_trait]
impl CameraDevice for ImageSequenceCamera {
    async fn open(&mut self, facing: FacingMode) -> StudioResult<Box<dyn MediaStream>> {
        if self.paths.is_empty() {
            return Err(StudioError::camera("no frames available"));
        }
        debug!(frames = self.paths.len(), ?facing, "opening image sequence camera");

        let mut frames = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let frame = image::open(path)
                .map_err(|e| {
                    StudioError::camera(format!("cannot read frame {}: {}", path.display(), e))
                })?
                .to_rgba8();
            frames.push(frame);
        }

        Ok(Box::new(ImageSequenceStream::new(frames)))
    }
}

/// Stream over decoded frames held in memory.
#[derive(Debug)]
pub struct ImageSequenceStream {
    frames: Vec<RgbaImage>,
    cursor: usize,
    stopped: bool,
}

impl ImageSequenceStream {
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self {
            frames,
            cursor: 0,
            stopped: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn current(&self) -> Option<&RgbaImage> {
        if self.stopped {
            return None;
        }
        self.frames.get(self.cursor)
    }
}

impl MediaStream for ImageSequenceStream {
    fn ready_state(&self) -> ReadyState {
        match self.current() {
            Some(_) => ReadyState::HaveEnoughData,
            None => ReadyState::HaveNothing,
        }
    }

    fn video_size(&self) -> (u32, u32) {
        self.current().map_or((0, 0), |frame| frame.dimensions())
    }

    fn read_frame(&mut self, buffer: &mut PixelBuffer) -> StudioResult<()> {
        let frame = self
            .current()
            .ok_or_else(|| StudioError::camera("stream stopped"))?;
        if frame.dimensions() != (buffer.width(), buffer.height()) {
            return Err(StudioError::camera("frame size changed during read"));
        }
        buffer.data_mut().copy_from_slice(frame.as_raw());
        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        }
        Ok(())
    }

    fn stop_tracks(&mut self) {
        self.stopped = true;
        self.frames.clear();
    }
}
