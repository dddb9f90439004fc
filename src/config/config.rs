//! # Studio Configuration
//!
//! Configuration for the generation client, the retry policy, video polling
//! and the tag scanner. It is the common interface between the CLI and the
//! library.
//!
//! ## Sources
//!
//! Values are layered, later sources winning:
//! 1. [`StudioConfig::default`]
//! 2. An optional TOML file ([`StudioConfig::from_file`])
//! 3. Environment (`GEMINI_API_KEY`, then `API_KEY`) via [`StudioConfig::apply_env`]
//! 4. CLI flags, applied by the binary
//!
//! ## Example
//!
//! ```rust
//! use tryon_studio::config::StudioConfig;
//!
//! let config: StudioConfig = toml::from_str(r#"
//!     api_key = "test-key"
//!
//!     [retry]
//!     max_attempts = 3
//!     initial_delay_ms = 2000
//! "#).unwrap();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.image_model, "gemini-2.5-flash-image");
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::capture::{DecodeOptions, FacingMode, InversionMode};
use crate::error::{StudioError, StudioResult};
use crate::generation::VideoConfig;
use crate::retry::RetryPolicy;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// API key for the generative service. Required for remote calls.
    pub api_key: Option<String>,
    /// REST endpoint root, without a trailing slash.
    pub base_url: String,
    /// Model used for try-on renders.
    pub image_model: String,
    /// Model used for 360° videos.
    pub video_model: String,
    /// Aspect-ratio hint for try-on renders.
    pub aspect_ratio: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    pub retry: RetrySettings,
    pub video: VideoSettings,
    pub scanner: ScannerSettings,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            aspect_ratio: "3:4".to_string(),
            request_timeout_secs: 120,
            retry: RetrySettings::default(),
            video: VideoSettings::default(),
            scanner: ScannerSettings::default(),
        }
    }
}

/// Rate-limit retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2000,
        }
    }
}

/// Video job and polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub poll_interval_secs: u64,
    /// Stop polling after this many queries; unset polls until done.
    pub max_polls: Option<u32>,
    pub resolution: String,
    pub aspect_ratio: String,
    pub number_of_videos: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        let video = VideoConfig::default();
        Self {
            poll_interval_secs: 10,
            max_polls: None,
            resolution: video.resolution,
            aspect_ratio: video.aspect_ratio,
            number_of_videos: video.number_of_videos,
        }
    }
}

/// Tag scanner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// Sampling ticks per second, standing in for the display refresh rate.
    pub tick_hz: u32,
    pub facing: FacingMode,
    pub inversion: InversionMode,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            facing: FacingMode::Environment,
            inversion: InversionMode::DontInvert,
        }
    }
}

impl StudioConfig {
    /// Load a TOML file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> StudioResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StudioError::io_at("read config", path.display().to_string(), e))?;
        toml::from_str(&content)
            .map_err(|e| StudioError::from(e).with_context(format!("parsing {}", path.display())))
    }

    /// Fill the API key from the environment unless one is already set.
    pub fn apply_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_ENV_VARS
                .iter()
                .find_map(|name| std::env::var(name).ok())
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    /// Validate all settings.
    pub fn validate(&self) -> StudioResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(StudioError::config("base_url", "", "must not be empty"));
        }
        if self.image_model.trim().is_empty() {
            return Err(StudioError::config("image_model", "", "must not be empty"));
        }
        if self.video_model.trim().is_empty() {
            return Err(StudioError::config("video_model", "", "must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(StudioError::config(
                "request_timeout_secs",
                "0",
                "must be greater than 0",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(StudioError::config(
                "retry.max_attempts",
                "0",
                "must be greater than 0",
            ));
        }
        if self.video.poll_interval_secs == 0 {
            return Err(StudioError::config(
                "video.poll_interval_secs",
                "0",
                "must be greater than 0",
            ));
        }
        if self.video.number_of_videos == 0 {
            return Err(StudioError::config(
                "video.number_of_videos",
                "0",
                "must be greater than 0",
            ));
        }
        if !(1..=240).contains(&self.scanner.tick_hz) {
            return Err(StudioError::config(
                "scanner.tick_hz",
                self.scanner.tick_hz.to_string(),
                "must be between 1 and 240",
            ));
        }
        Ok(())
    }

    /// The API key, or a configuration error naming where to set it.
    pub fn require_api_key(&self) -> StudioResult<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StudioError::config("api_key", "", "not set")
                    .with_recovery_suggestion("Set GEMINI_API_KEY or api_key in the config file")
            })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_delay_ms),
        )
    }

    pub fn video_config(&self) -> VideoConfig {
        VideoConfig {
            number_of_videos: self.video.number_of_videos,
            resolution: self.video.resolution.clone(),
            aspect_ratio: self.video.aspect_ratio.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.video.poll_interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.scanner.tick_hz.max(1)))
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            inversion: self.scanner.inversion,
        }
    }
}
