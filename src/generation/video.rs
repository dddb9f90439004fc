//! # 360° Video Generation
//!
//! Long-running video jobs are started once and then polled on a coarse
//! fixed interval until the service reports completion. This path is not
//! wrapped by the rate-limit retry policy.
//!
//! "Requested entity was not found." is surfaced as
//! [`StudioError::EntityNotFound`]: the caller has to re-select credentials
//! and start a fresh attempt, so the poll loop never retries it.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::VideoGenerator;
use super::payload::{ImagePayload, strip_data_url_prefix};
use super::prompts::VIDEO_PROMPT;
use crate::error::{ENTITY_NOT_FOUND_MESSAGE, StudioError, StudioResult};
use crate::retry::{Sleeper, TokioSleeper};

/// Wait between two status queries.
pub const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Output settings for a video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    pub number_of_videos: u32,
    pub resolution: String,
    pub aspect_ratio: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            number_of_videos: 1,
            resolution: "720p".to_string(),
            aspect_ratio: "9:16".to_string(),
        }
    }
}

/// A video job as submitted to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub prompt: String,
    pub image: ImagePayload,
    pub config: VideoConfig,
}

/// Handle to a long-running video operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    /// Failure message reported by a finished operation.
    pub error: Option<String>,
    /// Download location once the operation is done.
    pub video_uri: Option<String>,
}

/// A finished, downloaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutput {
    pub uri: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Starts, polls and downloads 360° orbit videos.
pub struct VideoService<V, S = TokioSleeper> {
    generator: V,
    sleeper: S,
    poll_interval: Duration,
    max_polls: Option<u32>,
    config: VideoConfig,
}

impl<V: VideoGenerator> VideoService<V, TokioSleeper> {
    pub fn new(generator: V) -> Self {
        Self::with_sleeper(generator, TokioSleeper)
    }
}

impl<V: VideoGenerator, S: Sleeper> VideoService<V, S> {
    pub fn with_sleeper(generator: V, sleeper: S) -> Self {
        Self {
            generator,
            sleeper,
            poll_interval: VIDEO_POLL_INTERVAL,
            max_polls: None,
            config: VideoConfig::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up with a timeout after this many status queries. `None` polls
    /// until the service reports completion.
    pub fn with_max_polls(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_config(mut self, config: VideoConfig) -> Self {
        self.config = config;
        self
    }

    /// Render a 360° orbit video of `base_image`, which may be raw base64 or
    /// a `data:image/...;base64,` URL.
    pub async fn generate_360_video(&self, base_image: &str) -> StudioResult<VideoOutput> {
        let image = ImagePayload::new("image/png", strip_data_url_prefix(base_image));
        self.generate_360_video_from(image).await
    }

    pub async fn generate_360_video_from(&self, image: ImagePayload) -> StudioResult<VideoOutput> {
        let request = VideoRequest {
            prompt: VIDEO_PROMPT.to_string(),
            image,
            config: self.config.clone(),
        };

        let mut operation = self
            .generator
            .start_video(&request)
            .await
            .map_err(escalate_entity_not_found)?;
        info!(operation = %operation.name, "video generation started");

        let mut polls = 0u32;
        while !operation.done {
            if let Some(max_polls) = self.max_polls {
                if polls >= max_polls {
                    let waited = self.poll_interval.saturating_mul(max_polls);
                    warn!(operation = %operation.name, polls, "video generation did not finish");
                    return Err(StudioError::timeout("video_poll", waited.as_millis() as u64)
                        .with_metadata("operation", operation.name.clone()));
                }
            }
            self.sleeper.sleep(self.poll_interval).await;
            operation = self
                .generator
                .poll_video(&operation)
                .await
                .map_err(escalate_entity_not_found)?;
            polls += 1;
            debug!(operation = %operation.name, polls, done = operation.done, "polled video operation");
        }

        if let Some(reason) = operation.error.take() {
            return Err(escalate_entity_not_found(StudioError::video_operation(
                Some(operation.name.clone()),
                reason,
            )));
        }

        let uri = operation.video_uri.take().ok_or_else(|| {
            StudioError::video_operation(Some(operation.name.clone()), "Video generation failed.")
        })?;

        let media = self.generator.download_video(&uri).await?;
        info!(bytes = media.bytes.len(), "video downloaded");
        Ok(VideoOutput {
            uri,
            bytes: media.bytes,
            mime_type: media.mime_type.unwrap_or_else(|| "video/mp4".to_string()),
        })
    }
}

/// Turn any failure mentioning the entity-not-found marker into the
/// dedicated re-authentication error.
pub fn escalate_entity_not_found(error: StudioError) -> StudioError {
    let message = match &error {
        StudioError::Api { message, .. } => Some(message.as_str()),
        StudioError::VideoOperation { reason, .. } => Some(reason.as_str()),
        _ => None,
    }
    .filter(|message| message.contains(ENTITY_NOT_FOUND_MESSAGE))
    .map(str::to_string);

    match message {
        Some(message) => StudioError::entity_not_found(message),
        None => error,
    }
}
