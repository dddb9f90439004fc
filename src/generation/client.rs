//! # Gemini REST Backend
//!
//! [`ImageGenerator`] and [`VideoGenerator`] over the Generative Language
//! REST API using an async `reqwest` client. The API key travels in the
//! `x-goog-api-key` header, including for video downloads.
//!
//! Non-success responses are decoded from the Google error envelope so the
//! HTTP status, the structured status string and the message all reach the
//! rate-limit classifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::payload::FetchedMedia;
use super::types::{
    ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, OperationWire,
    PredictLongRunningRequest, VideoImageWire, VideoInstanceWire, VideoParametersWire,
};
use super::video::{VideoOperation, VideoRequest};
use super::{ImageGenerator, VideoGenerator};
use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the generative image and video endpoints.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    image_model: String,
    video_model: String,
}

impl GeminiClient {
    /// Build a client from validated configuration. Fails without an API key.
    pub fn new(config: &StudioConfig) -> StudioResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StudioError::external("reqwest", e).with_operation("build http client"))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            image_model: config.image_model.clone(),
            video_model: config.video_model.clone(),
        })
    }

    /// Plain HTTP client shared with image fetching.
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, self.api_key.as_str())
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> StudioResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(%url, "POST");
        let response = self
            .authorized(self.http.post(url))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, url: &str) -> StudioResult<R> {
        debug!(%url, "GET");
        let response = self.authorized(self.http.get(url)).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> StudioResult<GenerateContentResponse> {
        let url = self.model_url(&self.image_model, "generateContent");
        self.post_json(&url, request)
            .await
            .map_err(|e| e.with_metadata("model", self.image_model.clone()))
    }
}

#[async_trait]
impl VideoGenerator for GeminiClient {
    async fn start_video(&self, request: &VideoRequest) -> StudioResult<VideoOperation> {
        let url = self.model_url(&self.video_model, "predictLongRunning");
        let body = PredictLongRunningRequest {
            instances: vec![VideoInstanceWire {
                prompt: request.prompt.clone(),
                image: VideoImageWire {
                    bytes_base64_encoded: request.image.data.clone(),
                    mime_type: request.image.mime_type.clone(),
                },
            }],
            parameters: VideoParametersWire {
                sample_count: request.config.number_of_videos,
                resolution: request.config.resolution.clone(),
                aspect_ratio: request.config.aspect_ratio.clone(),
            },
        };
        let operation: OperationWire = self.post_json(&url, &body).await?;
        Ok(operation.into())
    }

    async fn poll_video(&self, operation: &VideoOperation) -> StudioResult<VideoOperation> {
        let url = format!("{}/{}", self.base_url, operation.name);
        let operation: OperationWire = self.get_json(&url).await?;
        Ok(operation.into())
    }

    async fn download_video(&self, uri: &str) -> StudioResult<FetchedMedia> {
        debug!(%uri, "downloading video");
        let response = self.authorized(self.http.get(uri)).send().await?;
        read_media(response).await
    }
}

impl From<OperationWire> for VideoOperation {
    fn from(wire: OperationWire) -> Self {
        let video_uri = wire.video_uri().map(str::to_string);
        let error = wire.error.map(|error| {
            error
                .message
                .or(error.status)
                .unwrap_or_else(|| "unknown operation error".to_string())
        });
        Self {
            name: wire.name,
            done: wire.done,
            error,
            video_uri,
        }
    }
}

/// Fetch any URL without credentials, returning body bytes and content type.
pub async fn fetch_media(http: &Client, url: &str) -> StudioResult<FetchedMedia> {
    debug!(%url, "fetching media");
    let response = http.get(url).send().await?;
    read_media(response).await
}

async fn read_media(response: Response) -> StudioResult<FetchedMedia> {
    let response = ensure_success(response).await?;
    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
    let bytes = response.bytes().await?.to_vec();
    Ok(FetchedMedia { bytes, mime_type })
}

async fn read_json<R: DeserializeOwned>(response: Response) -> StudioResult<R> {
    let response = ensure_success(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| StudioError::from(e).with_context("decoding service response"))
}

async fn ensure_success(response: Response) -> StudioResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Map a failed HTTP exchange to [`StudioError::Api`].
pub fn api_error(status: u16, body: &str) -> StudioError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => StudioError::api(
            Some(envelope.error.code.unwrap_or(status)),
            envelope.error.status,
            envelope
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status)),
        ),
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            };
            StudioError::api(Some(status), None, message)
        }
    }
}
