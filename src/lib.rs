//! # Try-On Studio Core
//!
//! The non-visual core of a virtual try-on studio: rate-limit aware calls to
//! a generative image service, long-running 360° video generation, and a
//! live camera scanner that reads garment QR tags.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `retry`: Retrying remote invoker with exponential backoff on rate limits
//! - `generation`: Try-on and video services plus the Gemini REST backend
//! - `capture`: Live frame scanner sessions over pluggable cameras and decoders
//! - `catalog`: Sample garments, backdrops, palette and tag resolution
//! - `studio`: Selection value objects and the try-on workflow
//! - `config`: Configuration management and validation
//!
//! ## Example
//!
//! ```rust,no_run
//! use tryon_studio::config::StudioConfig;
//! use tryon_studio::generation::ImagePayload;
//! use tryon_studio::studio::{Selection, Studio};
//! use tryon_studio::catalog;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StudioConfig::default().apply_env();
//! let studio = Studio::connect(&config)?;
//!
//! let (selection, _) = Selection::new(ImagePayload::from_file("me.jpg")?)
//!     .with_palette("Cobalt Blue")
//!     .with_scanned_tag("g3");
//! let selection = selection.with_background(catalog::find_background("b2").unwrap());
//!
//! let result = studio.try_on(&selection).await?;
//! println!("{}", result.advice);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod retry;
pub mod studio;

/// Re-export error types for convenience
pub use error::{
    ErrorContext, ErrorSeverity, HasRecoverySuggestion, HasSeverity, Retryable, StudioError,
    StudioResult,
};

pub use capture::{ScanOutcome, ScanSession, ScanState};
pub use config::StudioConfig;
pub use generation::{GeminiClient, ImagePayload, TryOnService, VideoService};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use studio::{Selection, Studio, TryOnResult};
