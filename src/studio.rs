//! # Studio Workflow
//!
//! Orchestration of one styling session: an immutable [`Selection`] is
//! built up step by step, then turned into a try-on render and optionally a
//! 360° video. Errors are converted to user-facing messages only here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::future::join_all;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{self, Background, Garment};
use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult, classify};
use crate::generation::client::fetch_media;
use crate::generation::{
    GeminiClient, ImageGenerator, ImagePayload, TryOnService, VideoGenerator, VideoOutput,
    VideoService,
};
use crate::retry::{Sleeper, TokioSleeper};

pub const TRY_ON_FAILED_MESSAGE: &str =
    "AI transformation failed. Ensure your photo has a clear subject.";
pub const VIDEO_FAILED_MESSAGE: &str = "Cinematic rendering failed. Please try again.";
pub const UNRECOGNIZED_TAG_MESSAGE: &str = "Unrecognized tag.";
pub const CURATION_MESSAGE: &str = "AI Curation Applied: Minimalist Chic";

const STYLIST_IDLE: &str = "Your canvas is ready. Select a base piece to begin the story.";
const STYLIST_VIBES: [&str; 5] = [
    "The silhouette is taking shape. Consider adding a companion or accessory to balance the weight.",
    "A bold choice. The textures you've selected suggest a refined, editorial aesthetic.",
    "Proportions look perfect. That layering will catch the light beautifully in the render.",
    "Sophisticated. This combination challenges traditional forms in the best way possible.",
    "This look is speaking. It's giving high-fashion minimalism with a sharp edge.",
];

/// Where the garments for a try-on come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SelectionMode {
    /// Catalog garments
    #[default]
    Collection,
    /// User-uploaded garment photos
    Upload,
    /// A text description, with catalog garments as references
    Custom,
}

/// Outcome of applying a scanned tag to a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagScan {
    Added(Garment),
    AlreadySelected(Garment),
    Unrecognized(String),
}

impl TagScan {
    pub fn message(&self) -> String {
        match self {
            TagScan::Added(garment) => format!("Tag Recognized: {}", garment.name),
            TagScan::AlreadySelected(garment) => format!("{} is already selected", garment.name),
            TagScan::Unrecognized(_) => UNRECOGNIZED_TAG_MESSAGE.to_string(),
        }
    }
}

/// Everything the user picked for one render. Each `with_*` call returns
/// a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    mode: SelectionMode,
    subject: Option<ImagePayload>,
    garments: Vec<Garment>,
    uploaded_garments: Vec<ImagePayload>,
    background: Option<Background>,
    uploaded_background: Option<ImagePayload>,
    palette: Option<String>,
    custom_prompt: String,
}

impl Selection {
    pub fn new(subject: ImagePayload) -> Self {
        Self::default().with_subject(subject)
    }

    pub fn with_subject(self, subject: ImagePayload) -> Self {
        Self {
            subject: Some(subject),
            ..self
        }
    }

    pub fn with_mode(self, mode: SelectionMode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_garment(mut self, garment: Garment) -> Self {
        if !self.garments.iter().any(|g| g.id == garment.id) {
            self.garments.push(garment);
        }
        self
    }

    /// Add the garment if absent, remove it if present.
    pub fn toggle_garment(mut self, garment: Garment) -> Self {
        match self.garments.iter().position(|g| g.id == garment.id) {
            Some(index) => {
                self.garments.remove(index);
            }
            None => self.garments.push(garment),
        }
        self
    }

    /// Replace the catalog garments with a random top, bottom and pair of
    /// shoes.
    pub fn curated<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        Self {
            garments: catalog::curate(rng),
            ..self
        }
    }

    pub fn with_uploaded_garment(mut self, garment: ImagePayload) -> Self {
        self.uploaded_garments.push(garment);
        self
    }

    pub fn with_background(self, background: Background) -> Self {
        Self {
            background: Some(background),
            ..self
        }
    }

    /// An uploaded backdrop replaces any catalog backdrop.
    pub fn with_uploaded_background(self, background: ImagePayload) -> Self {
        Self {
            uploaded_background: Some(background),
            background: None,
            ..self
        }
    }

    /// Select a palette colour by name; "None" clears it.
    pub fn with_palette(self, name: &str) -> Self {
        Self {
            palette: catalog::palette_name(name),
            ..self
        }
    }

    pub fn with_custom_prompt(self, prompt: impl Into<String>) -> Self {
        Self {
            custom_prompt: prompt.into(),
            ..self
        }
    }

    /// Apply a scanned tag payload. A known garment is added unless it is
    /// already selected.
    pub fn with_scanned_tag(self, payload: &str) -> (Self, TagScan) {
        match catalog::resolve_tag(payload) {
            Some(garment) if self.garments.iter().any(|g| g.id == garment.id) => {
                (self, TagScan::AlreadySelected(garment))
            }
            Some(garment) => (self.with_garment(garment.clone()), TagScan::Added(garment)),
            None => (self, TagScan::Unrecognized(payload.to_string())),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn subject(&self) -> Option<&ImagePayload> {
        self.subject.as_ref()
    }

    pub fn garments(&self) -> &[Garment] {
        &self.garments
    }

    pub fn uploaded_garments(&self) -> &[ImagePayload] {
        &self.uploaded_garments
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn uploaded_background(&self) -> Option<&ImagePayload> {
        self.uploaded_background.as_ref()
    }

    pub fn palette(&self) -> Option<&str> {
        self.palette.as_deref()
    }

    pub fn custom_prompt(&self) -> &str {
        &self.custom_prompt
    }

    /// Number of pieces that will go into the render.
    pub fn total_selected(&self) -> usize {
        let custom = usize::from(
            self.mode == SelectionMode::Custom && !self.custom_prompt.trim().is_empty(),
        );
        self.garments.len() + self.uploaded_garments.len() + custom
    }

    /// Stylist commentary for the current selection size.
    pub fn stylist_insight(&self) -> &'static str {
        match self.total_selected() {
            0 => STYLIST_IDLE,
            n => STYLIST_VIBES[n.min(STYLIST_VIBES.len() - 1)],
        }
    }
}

/// A finished render, optionally with its 360° video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnResult {
    pub id: String,
    pub image: ImagePayload,
    pub advice: String,
    pub custom_prompt: Option<String>,
    pub garment_ids: Vec<String>,
    pub background_id: Option<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    pub video: Option<VideoOutput>,
}

impl TryOnResult {
    pub fn image_data_url(&self) -> String {
        self.image.to_data_url()
    }
}

/// Which orchestration step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    TryOn,
    Video,
}

/// What the user is told after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: &'static str,
    /// The credential must be chosen again before the next video attempt.
    pub requires_key_reselection: bool,
}

pub fn user_message(step: FailedStep, error: &StudioError) -> UserFacingError {
    match step {
        FailedStep::TryOn => UserFacingError {
            message: TRY_ON_FAILED_MESSAGE,
            requires_key_reselection: false,
        },
        FailedStep::Video => UserFacingError {
            message: VIDEO_FAILED_MESSAGE,
            requires_key_reselection: classify::requires_key_reselection(error),
        },
    }
}

/// Loads remote images referenced by the catalog.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> StudioResult<ImagePayload>;
}

#[async_trait]
impl<T: ImageFetcher + ?Sized> ImageFetcher for std::sync::Arc<T> {
    async fn fetch_image(&self, url: &str) -> StudioResult<ImagePayload> {
        (**self).fetch_image(url).await
    }
}

/// [`ImageFetcher`] over plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    http: Client,
}

impl HttpImageFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> StudioResult<ImagePayload> {
        let media = fetch_media(&self.http, url).await?;
        ImagePayload::from_media(&media).map_err(|e| e.with_context(format!("fetching {url}")))
    }
}

/// Try-on and video services plus the image fetcher behind them.
pub struct Studio<G, V, F, S = TokioSleeper> {
    try_on: TryOnService<G, S>,
    video: VideoService<V, S>,
    fetcher: F,
}

impl Studio<GeminiClient, GeminiClient, HttpImageFetcher, TokioSleeper> {
    /// Wire up the REST backend from validated configuration.
    pub fn connect(config: &StudioConfig) -> StudioResult<Self> {
        let client = GeminiClient::new(config)?;
        let fetcher = HttpImageFetcher::new(client.http().clone());
        let try_on = TryOnService::new(client.clone())
            .with_policy(config.retry_policy())
            .with_aspect_ratio(config.aspect_ratio.clone());
        let video = VideoService::new(client)
            .with_poll_interval(config.poll_interval())
            .with_max_polls(config.video.max_polls)
            .with_config(config.video_config());
        Ok(Studio::new(try_on, video, fetcher))
    }
}

impl<G, V, F, S> Studio<G, V, F, S>
where
    G: ImageGenerator,
    V: VideoGenerator,
    F: ImageFetcher,
    S: Sleeper,
{
    pub fn new(try_on: TryOnService<G, S>, video: VideoService<V, S>, fetcher: F) -> Self {
        Self {
            try_on,
            video,
            fetcher,
        }
    }

    /// Render the selection onto its subject.
    pub async fn try_on(&self, selection: &Selection) -> StudioResult<TryOnResult> {
        let subject = selection
            .subject()
            .ok_or_else(|| StudioError::validation("subject", "a subject photo is required", ""))?;

        let background = match (selection.uploaded_background(), selection.background()) {
            (Some(uploaded), _) => Some(uploaded.clone()),
            (None, Some(background)) => Some(self.fetcher.fetch_image(&background.image_url).await?),
            (None, None) => None,
        };
        let palette = selection.palette();

        let output = match selection.mode() {
            SelectionMode::Collection => {
                let garments = self.fetch_garments(selection.garments()).await?;
                if garments.is_empty() {
                    return Err(StudioError::validation(
                        "garments",
                        "select at least one garment",
                        "",
                    ));
                }
                self.try_on
                    .virtual_try_on(subject, &garments, background.as_ref(), palette)
                    .await?
            }
            SelectionMode::Upload => {
                if selection.uploaded_garments().is_empty() {
                    return Err(StudioError::validation(
                        "uploaded_garments",
                        "upload at least one garment",
                        "",
                    ));
                }
                self.try_on
                    .virtual_try_on(
                        subject,
                        selection.uploaded_garments(),
                        background.as_ref(),
                        palette,
                    )
                    .await?
            }
            SelectionMode::Custom => {
                let references = self.fetch_garments(selection.garments()).await?;
                self.try_on
                    .custom_try_on(
                        subject,
                        selection.custom_prompt(),
                        &references,
                        background.as_ref(),
                        palette,
                    )
                    .await?
            }
        };

        let result = TryOnResult {
            id: next_result_id(),
            image: output.image,
            advice: output.advice,
            custom_prompt: (selection.mode() == SelectionMode::Custom)
                .then(|| selection.custom_prompt().to_string()),
            garment_ids: selection.garments().iter().map(|g| g.id.clone()).collect(),
            background_id: selection.background().map(|bg| bg.id.clone()),
            created_at: now_millis(),
            video: None,
        };
        info!(id = %result.id, mode = ?selection.mode(), "try-on complete");
        Ok(result)
    }

    /// Render a 360° video of a finished try-on.
    pub async fn render_video(&self, result: &TryOnResult) -> StudioResult<TryOnResult> {
        let video = self
            .video
            .generate_360_video_from(result.image.clone())
            .await
            .inspect_err(|e| warn!(id = %result.id, error = %e, "video rendering failed"))?;
        Ok(TryOnResult {
            video: Some(video),
            ..result.clone()
        })
    }

    async fn fetch_garments(&self, garments: &[Garment]) -> StudioResult<Vec<ImagePayload>> {
        join_all(
            garments
                .iter()
                .map(|garment| self.fetcher.fetch_image(&garment.image_url)),
        )
        .await
        .into_iter()
        .collect()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Short process-unique id: timestamp plus a counter, base 36.
fn next_result_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seed = now_millis()
        .wrapping_mul(1_000)
        .wrapping_add(COUNTER.fetch_add(1, Ordering::Relaxed) % 1_000);
    to_base36(seed)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
