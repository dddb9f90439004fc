//! Common test utilities for the studio integration tests
//!
//! Fakes for every seam the library exposes: the wait step of the retry
//! policy, the image and video generators, the image fetcher, and the camera,
//! ticker and decoder behind a scan session.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use qrcode::{Color, QrCode};
use tokio::sync::{mpsc, oneshot};
use tryon_studio::capture::{
    BarcodeDecoder, CameraDevice, DecodeOptions, FacingMode, FrameTicker, MediaStream,
    PixelBuffer, ReadyState, ScanOutcome,
};
use tryon_studio::error::{StudioError, StudioResult};
use tryon_studio::generation::types::{Candidate, Content};
use tryon_studio::generation::{
    FetchedMedia, GenerateContentRequest, GenerateContentResponse, ImageGenerator, ImagePayload,
    Part, VideoGenerator, VideoOperation, VideoRequest,
};
use tryon_studio::retry::Sleeper;
use tryon_studio::studio::ImageFetcher;

/// Sleeper that records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

pub fn payload(mime: &str, data: &str) -> ImagePayload {
    ImagePayload::new(mime, data)
}

pub fn rate_limited() -> StudioError {
    StudioError::api(
        Some(429),
        Some("RESOURCE_EXHAUSTED".into()),
        "Resource has been exhausted (e.g. check quota).",
    )
}

pub fn response_with(parts: Vec<Part>) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".into()),
                parts: Some(parts),
            }),
            finish_reason: Some("STOP".into()),
        }],
    }
}

/// A well-formed try-on response: advice text plus one image.
pub fn image_response(advice: &str, data: &str) -> GenerateContentResponse {
    response_with(vec![Part::text(advice), Part::image(&payload("image/png", data))])
}

/// Image generator answering from a script, recording every request.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<StudioResult<GenerateContentResponse>>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = StudioResult<GenerateContentResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> StudioResult<GenerateContentResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StudioError::api(Some(500), None, "script exhausted")))
    }
}

/// Video generator answering from a script.
#[derive(Debug, Default)]
pub struct ScriptedVideo {
    start: Mutex<Option<StudioResult<VideoOperation>>>,
    polls: Mutex<VecDeque<StudioResult<VideoOperation>>>,
    requests: Mutex<Vec<VideoRequest>>,
    downloads: Mutex<Vec<String>>,
    poll_count: AtomicUsize,
}

impl ScriptedVideo {
    pub fn new(
        start: StudioResult<VideoOperation>,
        polls: impl IntoIterator<Item = StudioResult<VideoOperation>>,
    ) -> Self {
        Self {
            start: Mutex::new(Some(start)),
            polls: Mutex::new(polls.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<VideoRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

pub fn pending_operation(name: &str) -> VideoOperation {
    VideoOperation {
        name: name.to_string(),
        ..VideoOperation::default()
    }
}

pub fn finished_operation(name: &str, uri: &str) -> VideoOperation {
    VideoOperation {
        name: name.to_string(),
        done: true,
        error: None,
        video_uri: Some(uri.to_string()),
    }
}

#[async_trait]
impl VideoGenerator for ScriptedVideo {
    async fn start_video(&self, request: &VideoRequest) -> StudioResult<VideoOperation> {
        self.requests.lock().unwrap().push(request.clone());
        self.start
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(StudioError::api(Some(500), None, "started twice")))
    }

    async fn poll_video(&self, operation: &VideoOperation) -> StudioResult<VideoOperation> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(pending_operation(&operation.name)))
    }

    async fn download_video(&self, uri: &str) -> StudioResult<FetchedMedia> {
        self.downloads.lock().unwrap().push(uri.to_string());
        Ok(FetchedMedia {
            bytes: b"mp4-bytes".to_vec(),
            mime_type: Some("video/mp4".into()),
        })
    }
}

/// Fetcher serving a fixed payload per URL, counting fetches.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch_image(&self, url: &str) -> StudioResult<ImagePayload> {
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(payload("image/jpeg", &format!("fetched:{url}")))
    }
}

/// Shared knobs and counters behind a [`FakeCamera`] stream.
#[derive(Debug)]
pub struct StreamControl {
    ready: Mutex<ReadyState>,
    size: Mutex<(u32, u32)>,
    stops: AtomicUsize,
    reads: AtomicUsize,
}

impl StreamControl {
    pub fn new(ready: ReadyState, size: (u32, u32)) -> Arc<Self> {
        Arc::new(Self {
            ready: Mutex::new(ready),
            size: Mutex::new(size),
            stops: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn set_ready(&self, ready: ReadyState) {
        *self.ready.lock().unwrap() = ready;
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

struct FakeStream {
    control: Arc<StreamControl>,
}

impl MediaStream for FakeStream {
    fn ready_state(&self) -> ReadyState {
        *self.control.ready.lock().unwrap()
    }

    fn video_size(&self) -> (u32, u32) {
        *self.control.size.lock().unwrap()
    }

    fn read_frame(&mut self, buffer: &mut PixelBuffer) -> StudioResult<()> {
        self.control.reads.fetch_add(1, Ordering::SeqCst);
        buffer.data_mut().fill(128);
        Ok(())
    }

    fn stop_tracks(&mut self) {
        self.control.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Camera handing out [`StreamControl`]-backed streams.
pub struct FakeCamera {
    control: Arc<StreamControl>,
    gate: Option<oneshot::Receiver<()>>,
    deny: bool,
    opens: Arc<AtomicUsize>,
    facing: Arc<Mutex<Option<FacingMode>>>,
}

impl FakeCamera {
    pub fn new(control: Arc<StreamControl>) -> Self {
        Self {
            control,
            gate: None,
            deny: false,
            opens: Arc::default(),
            facing: Arc::default(),
        }
    }

    /// Camera whose access request is rejected.
    pub fn denied(control: Arc<StreamControl>) -> Self {
        Self {
            deny: true,
            ..Self::new(control)
        }
    }

    /// Camera whose acquisition completes only when the returned sender fires.
    pub fn gated(control: Arc<StreamControl>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: Some(rx),
                ..Self::new(control)
            },
            tx,
        )
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }

    pub fn requested_facing(&self) -> Arc<Mutex<Option<FacingMode>>> {
        Arc::clone(&self.facing)
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(&mut self, facing: FacingMode) -> StudioResult<Box<dyn MediaStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.facing.lock().unwrap() = Some(facing);
        if let Some(gate) = self.gate.take() {
            let _ = gate.await;
        }
        if self.deny {
            return Err(StudioError::camera("NotAllowedError: permission denied"));
        }
        Ok(Box::new(FakeStream {
            control: Arc::clone(&self.control),
        }))
    }
}

/// Ticker stepped explicitly by the test through a [`TickDriver`].
pub struct ChannelTicker {
    ticks: mpsc::UnboundedReceiver<()>,
    waiting: mpsc::UnboundedSender<()>,
}

/// Test side of a [`ChannelTicker`].
pub struct TickDriver {
    ticks: mpsc::UnboundedSender<()>,
    waiting: mpsc::UnboundedReceiver<()>,
}

pub fn channel_ticker() -> (ChannelTicker, TickDriver) {
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();
    let (wait_tx, wait_rx) = mpsc::unbounded_channel();
    (
        ChannelTicker {
            ticks: tick_rx,
            waiting: wait_tx,
        },
        TickDriver {
            ticks: tick_tx,
            waiting: wait_rx,
        },
    )
}

#[async_trait]
impl FrameTicker for ChannelTicker {
    async fn tick(&mut self) {
        let _ = self.waiting.send(());
        if self.ticks.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

impl TickDriver {
    /// Wait until the session asks for its next tick.
    pub async fn idle(&mut self) {
        self.waiting.recv().await;
    }

    /// Release one tick and wait until the session has processed it.
    pub async fn step(&mut self) {
        let _ = self.ticks.send(());
        self.idle().await;
    }

    /// Release one tick without waiting; for ticks that end the session.
    pub fn fire(&self) {
        let _ = self.ticks.send(());
    }

    /// Whether the session asks for another tick within `limit`.
    pub async fn asks_again_within(&mut self, limit: Duration) -> bool {
        matches!(
            tokio::time::timeout(limit, self.waiting.recv()).await,
            Ok(Some(()))
        )
    }
}

/// Decoder answering from a script, recording what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Option<String>>>,
    sizes: Mutex<Vec<(u32, u32)>>,
    options: Mutex<Vec<DecodeOptions>>,
}

impl ScriptedDecoder {
    pub fn new(script: impl IntoIterator<Item = Option<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.sizes.lock().unwrap().len()
    }

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().unwrap().clone()
    }

    pub fn options(&self) -> Vec<DecodeOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(&self, frame: &PixelBuffer, options: &DecodeOptions) -> Option<String> {
        self.sizes
            .lock()
            .unwrap()
            .push((frame.width(), frame.height()));
        self.options.lock().unwrap().push(*options);
        self.script.lock().unwrap().pop_front().flatten()
    }
}

/// Completion callback that records every outcome it receives.
pub fn outcome_recorder() -> (
    Arc<Mutex<Vec<ScanOutcome>>>,
    impl FnOnce(ScanOutcome) + Send + 'static,
) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    (outcomes, move |outcome| sink.lock().unwrap().push(outcome))
}

/// A QR code image for `payload`: six pixels per module, four-module quiet
/// zone, dark on light unless `inverted`.
pub fn qr_image(payload: &str, inverted: bool) -> RgbaImage {
    const MODULE_PX: u32 = 6;
    const QUIET_ZONE: u32 = 4;

    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    RgbaImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&my);
        let dark = inside
            && colors[((my - QUIET_ZONE) * modules + (mx - QUIET_ZONE)) as usize] == Color::Dark;
        let value = if dark != inverted { 0 } else { 255 };
        Rgba([value, value, value, 255])
    })
}
