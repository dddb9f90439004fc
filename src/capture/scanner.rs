//! # Scan Session
//!
//! One live tag scan: acquire a camera stream, sample a frame on every
//! display tick, decode it, and report the first payload through a single
//! completion callback.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Acquiring -> Sampling -> Found(payload)
//!            |            |
//!            |            +-------> Closed
//!            +--> Failed(msg)
//!            +--> Closed
//! ```
//!
//! `Found`, `Failed` and `Closed` are terminal. Once a session leaves
//! `Sampling` no further frame is read and the callback can no longer fire
//! except through the `Found` transition that consumed it. Tracks of an
//! acquired stream are stopped exactly once: on `Found`, on [`ScanSession::close`],
//! or immediately if acquisition finishes after the session was closed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    BarcodeDecoder, CameraDevice, DecodeOptions, FacingMode, FrameTicker, MediaStream,
    PixelBuffer, ReadyState,
};
use crate::error::{StudioError, StudioResult};

/// Standing message shown when no camera stream could be obtained.
pub const CAMERA_UNAVAILABLE_MESSAGE: &str = "Camera access denied or unavailable.";

/// Observable lifecycle state of a [`ScanSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Acquiring,
    Sampling,
    Found(String),
    Failed(String),
    Closed,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Found(_) | ScanState::Failed(_) | ScanState::Closed
        )
    }
}

/// What the completion callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The decoded tag payload, passed through verbatim
    Decoded(String),
    /// Camera acquisition failed; carries the standing user message
    CameraUnavailable(String),
}

/// Per-session settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub facing: FacingMode,
    pub decode: DecodeOptions,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Ticks on which the stream was consulted
    pub ticks: u64,
    /// Frames actually copied and handed to the decoder
    pub frames_sampled: u64,
}

type ScanCallback = Box<dyn FnOnce(ScanOutcome) + Send + 'static>;

struct Inner {
    state: ScanState,
    stream: Option<Box<dyn MediaStream>>,
    callback: Option<ScanCallback>,
    stats: ScanStats,
}

struct Shared {
    inner: Mutex<Inner>,
}

enum Sample {
    Captured,
    NotReady,
    Stopped,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand the acquired stream to the session, or stop it if the session
    /// was closed while acquisition was in flight.
    fn install(&self, mut stream: Box<dyn MediaStream>) -> bool {
        {
            let mut inner = self.lock();
            if inner.state == ScanState::Acquiring {
                inner.state = ScanState::Sampling;
                inner.stream = Some(stream);
                return true;
            }
        }
        debug!("camera acquired after close, releasing");
        stream.stop_tracks();
        false
    }

    fn fail(&self, error: &StudioError) {
        let callback = {
            let mut inner = self.lock();
            if inner.state != ScanState::Acquiring {
                return;
            }
            inner.state = ScanState::Failed(CAMERA_UNAVAILABLE_MESSAGE.to_string());
            inner.callback.take()
        };
        warn!(error = %error, "camera acquisition failed");
        if let Some(callback) = callback {
            callback(ScanOutcome::CameraUnavailable(
                CAMERA_UNAVAILABLE_MESSAGE.to_string(),
            ));
        }
    }

    fn sample(&self, buffer: &mut PixelBuffer) -> Sample {
        let mut inner = self.lock();
        if inner.state != ScanState::Sampling {
            return Sample::Stopped;
        }
        inner.stats.ticks += 1;
        let Some(stream) = inner.stream.as_mut() else {
            return Sample::Stopped;
        };
        if stream.ready_state() < ReadyState::HaveEnoughData {
            return Sample::NotReady;
        }

        // Dimensions are re-read every tick; the stream may renegotiate.
        let (width, height) = stream.video_size();
        if width == 0 || height == 0 {
            return Sample::NotReady;
        }
        buffer.resize(width, height);
        if let Err(e) = stream.read_frame(buffer) {
            debug!(error = %e, "frame read failed, skipping tick");
            return Sample::NotReady;
        }
        inner.stats.frames_sampled += 1;
        Sample::Captured
    }

    fn found(&self, payload: String) {
        let (callback, stream) = {
            let mut inner = self.lock();
            if inner.state != ScanState::Sampling {
                return;
            }
            inner.state = ScanState::Found(payload.clone());
            (inner.callback.take(), inner.stream.take())
        };
        if let Some(mut stream) = stream {
            stream.stop_tracks();
        }
        info!(payload = %payload, "tag decoded");
        if let Some(callback) = callback {
            callback(ScanOutcome::Decoded(payload));
        }
    }
}

/// Handle to a running scan. Dropping it closes the session.
pub struct ScanSession {
    shared: Arc<Shared>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ScanSession {
    /// Start scanning on the current tokio runtime.
    ///
    /// `on_complete` runs at most once, with the decoded payload or with the
    /// camera-unavailable outcome. It never runs after [`Self::close`].
    pub fn start<C, D, T, F>(
        camera: C,
        decoder: D,
        ticker: T,
        options: ScanOptions,
        on_complete: F,
    ) -> Self
    where
        C: CameraDevice + 'static,
        D: BarcodeDecoder + 'static,
        T: FrameTicker + 'static,
        F: FnOnce(ScanOutcome) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: ScanState::Acquiring,
                stream: None,
                callback: Some(Box::new(on_complete)),
                stats: ScanStats::default(),
            }),
        });
        let (cancel, cancelled) = watch::channel(false);

        debug!(facing = ?options.facing, inversion = ?options.decode.inversion, "starting scan session");
        let task = tokio::spawn(run_session(
            Arc::clone(&shared),
            camera,
            decoder,
            ticker,
            options,
            cancelled,
        ));

        Self {
            shared,
            cancel,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().state.clone()
    }

    /// Standing error message, present only after acquisition failed.
    pub fn error_message(&self) -> Option<String> {
        match &self.shared.lock().state {
            ScanState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.shared.lock().state.is_terminal()
    }

    pub fn stats(&self) -> ScanStats {
        self.shared.lock().stats
    }

    /// Stop sampling, release the camera and discard the callback.
    ///
    /// Synchronous and idempotent. A session that already reached `Found`
    /// or `Failed` keeps that state.
    pub fn close(&self) {
        let released = {
            let mut inner = self.shared.lock();
            inner.callback = None;
            if !inner.state.is_terminal() {
                inner.state = ScanState::Closed;
                info!("scan session closed");
            }
            inner.stream.take()
        };
        self.cancel.send_replace(true);
        if let Some(mut stream) = released {
            stream.stop_tracks();
            debug!("camera tracks released on close");
        }
    }

    /// Wait for the sampling task to finish.
    pub async fn wait(&mut self) -> StudioResult<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| StudioError::external("tokio", e).with_operation("scan session task")),
            None => Ok(()),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_session<C, D, T>(
    shared: Arc<Shared>,
    mut camera: C,
    decoder: D,
    mut ticker: T,
    options: ScanOptions,
    mut cancelled: watch::Receiver<bool>,
) where
    C: CameraDevice,
    D: BarcodeDecoder,
    T: FrameTicker,
{
    // Acquisition is not raced against close: a stream that arrives after
    // close must still have its tracks stopped.
    let stream = match camera.open(options.facing).await {
        Ok(stream) => stream,
        Err(e) => {
            shared.fail(&e);
            return;
        }
    };
    if !shared.install(stream) {
        return;
    }
    info!("camera acquired, sampling frames");

    let mut buffer = PixelBuffer::default();
    loop {
        tokio::select! {
            biased;
            _ = cancelled.changed() => return,
            _ = ticker.tick() => {}
        }

        match shared.sample(&mut buffer) {
            Sample::Stopped => return,
            Sample::NotReady => continue,
            Sample::Captured => {}
        }

        if let Some(payload) = decoder.decode(&buffer, &options.decode) {
            shared.found(payload);
            return;
        }
    }
}

/// Run one session to completion and return the decoded payload.
///
/// Fails with a camera error when acquisition fails and with a timeout
/// error when `timeout` elapses first; the session is closed either way.
pub async fn scan_for_tag<C, D, T>(
    camera: C,
    decoder: D,
    ticker: T,
    options: ScanOptions,
    timeout: Option<Duration>,
) -> StudioResult<String>
where
    C: CameraDevice + 'static,
    D: BarcodeDecoder + 'static,
    T: FrameTicker + 'static,
{
    let (tx, rx) = oneshot::channel();
    let session = ScanSession::start(camera, decoder, ticker, options, move |outcome| {
        let _ = tx.send(outcome);
    });

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                session.close();
                return Err(StudioError::timeout("tag scan", limit.as_millis() as u64));
            }
        },
        None => rx.await,
    };
    session.close();

    match outcome {
        Ok(ScanOutcome::Decoded(payload)) => Ok(payload),
        Ok(ScanOutcome::CameraUnavailable(message)) => Err(StudioError::camera(message)),
        Err(_) => Err(StudioError::camera("scan session ended without a result")),
    }
}
