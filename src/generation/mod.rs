//! # Generation Module
//!
//! Contracts for the generative image and video services, the Gemini REST
//! backend that implements them, and the services layered on top:
//!
//! - [`tryon::TryOnService`]: image try-on calls wrapped in the retry policy
//! - [`video::VideoService`]: long-running 360° video generation with polling
//!
//! Backends are traits so that the services can be driven by fakes in tests.

pub mod client;
pub mod payload;
pub mod prompts;
pub mod tryon;
pub mod types;
pub mod video;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StudioResult;

pub use client::GeminiClient;
pub use payload::{FetchedMedia, ImagePayload, strip_data_url_prefix};
pub use tryon::{TryOnOutput, TryOnService, extract_result};
pub use types::{GenerateContentRequest, GenerateContentResponse, Part};
pub use video::{VideoConfig, VideoOperation, VideoOutput, VideoRequest, VideoService};

/// Generative image service: one request in, one response out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Send images plus a text instruction and return the raw response.
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> StudioResult<GenerateContentResponse>;
}

/// Generative video service exposing a long-running operation.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Submit a generation job and return its operation handle.
    async fn start_video(&self, request: &VideoRequest) -> StudioResult<VideoOperation>;

    /// Re-read the state of a previously started operation.
    async fn poll_video(&self, operation: &VideoOperation) -> StudioResult<VideoOperation>;

    /// Download the finished video.
    async fn download_video(&self, uri: &str) -> StudioResult<FetchedMedia>;
}

#[async_trait]
impl<T: ImageGenerator + ?Sized> ImageGenerator for Arc<T> {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> StudioResult<GenerateContentResponse> {
        (**self).generate_content(request).await
    }
}

#[async_trait]
impl<T: VideoGenerator + ?Sized> VideoGenerator for Arc<T> {
    async fn start_video(&self, request: &VideoRequest) -> StudioResult<VideoOperation> {
        (**self).start_video(request).await
    }

    async fn poll_video(&self, operation: &VideoOperation) -> StudioResult<VideoOperation> {
        (**self).poll_video(operation).await
    }

    async fn download_video(&self, uri: &str) -> StudioResult<FetchedMedia> {
        (**self).download_video(uri).await
    }
}
