//! # Capture Module
//!
//! Live tag scanning: a camera stream is sampled once per display tick and
//! every frame is handed to a 2D barcode decoder until a payload is found.
//!
//! ## Architecture
//!
//! 1. **CameraDevice**: acquires a [`MediaStream`] for a facing preference
//! 2. **MediaStream**: readiness, live dimensions, frame copy, track release
//! 3. **FrameTicker**: the display-refresh boundary between two samples
//! 4. **BarcodeDecoder**: pixel buffer in, payload out
//! 5. **ScanSession**: owns the above and runs the sampling loop
//!
//! Concrete sources live in [`sources`] and the rqrr-backed decoder in
//! [`decoder`].

pub mod decoder;
pub mod scanner;
pub mod sources;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StudioResult;

pub use decoder::RqrrDecoder;
pub use scanner::{
    CAMERA_UNAVAILABLE_MESSAGE, ScanOptions, ScanOutcome, ScanSession, ScanState, ScanStats,
    scan_for_tag,
};
pub use sources::{ImageSequenceCamera, IntervalTicker};

/// Which camera to prefer when several are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera, facing the user
    User,
    /// Rear camera, facing away from the user
    #[default]
    Environment,
}

/// How much video data a stream has buffered, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Which barcode polarities the decoder searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionMode {
    /// Dark modules on a light background only
    #[default]
    DontInvert,
    /// Light modules on a dark background only
    OnlyInvert,
    /// Normal polarity first, then inverted
    AttemptBoth,
}

/// Decoder configuration applied on every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub inversion: InversionMode,
}

/// Off-screen RGBA8 pixel buffer that frames are copied into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut buffer = Self::default();
        buffer.resize(width, height);
        buffer
    }

    /// Wrap existing RGBA8 data; `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Resize to the given dimensions, reusing the allocation.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.resize(width as usize * height as usize * 4, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Rec. 601 luma of the pixel at (x, y).
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let (r, g, b) = (
            u32::from(self.data[idx]),
            u32::from(self.data[idx + 1]),
            u32::from(self.data[idx + 2]),
        );
        ((r * 77 + g * 150 + b * 29) >> 8) as u8
    }
}

/// Source of live camera streams.
#[async_trait]
pub trait CameraDevice: Send {
    /// Request access to a camera. Fails on denial or when none is available.
    async fn open(&mut self, facing: FacingMode) -> StudioResult<Box<dyn MediaStream>>;
}

/// A live video stream owned by one scan session.
pub trait MediaStream: Send {
    /// How much data is buffered for the current frame.
    fn ready_state(&self) -> ReadyState;

    /// Current video dimensions; may change once the stream negotiates.
    fn video_size(&self) -> (u32, u32);

    /// Copy the current frame into `buffer`, already sized to [`Self::video_size`].
    fn read_frame(&mut self, buffer: &mut PixelBuffer) -> StudioResult<()>;

    /// Stop every track and release the device.
    fn stop_tracks(&mut self);
}

/// Display-refresh boundary between two sampling ticks.
#[async_trait]
pub trait FrameTicker: Send {
    async fn tick(&mut self);
}

/// 2D barcode decoder.
pub trait BarcodeDecoder: Send + Sync {
    /// Decode one frame, returning the payload of the first readable code.
    fn decode(&self, frame: &PixelBuffer, options: &DecodeOptions) -> Option<String>;
}

impl<T: BarcodeDecoder + ?Sized> BarcodeDecoder for std::sync::Arc<T> {
    fn decode(&self, frame: &PixelBuffer, options: &DecodeOptions) -> Option<String> {
        (**self).decode(frame, options)
    }
}
