//! # Try-On Service
//!
//! Image try-on calls against an [`ImageGenerator`]: request assembly,
//! the rate-limit retry policy, and extraction of the synthesized image and
//! styling advice from the response.

use tracing::{debug, info};

use super::payload::ImagePayload;
use super::prompts;
use super::types::GenerateContentRequest;
use super::{GenerateContentResponse, ImageGenerator};
use crate::error::{StudioError, StudioResult};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper, call_with_retry};

/// Aspect ratio requested for try-on renders.
pub const TRY_ON_ASPECT_RATIO: &str = "3:4";

/// Synthesized image plus short textual styling advice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnOutput {
    pub image: ImagePayload,
    /// Empty when the service returned no text.
    pub advice: String,
}

impl TryOnOutput {
    /// The image as a `data:` URL.
    pub fn image_data_url(&self) -> String {
        self.image.to_data_url()
    }
}

/// Try-on calls wrapped in the retrying invoker.
pub struct TryOnService<G, S = TokioSleeper> {
    generator: G,
    sleeper: S,
    policy: RetryPolicy,
    aspect_ratio: String,
}

impl<G: ImageGenerator> TryOnService<G, TokioSleeper> {
    /// Service using wall-clock backoff and the default policy.
    pub fn new(generator: G) -> Self {
        Self::with_sleeper(generator, TokioSleeper)
    }
}

impl<G: ImageGenerator, S: Sleeper> TryOnService<G, S> {
    /// Service with an injected wait step.
    pub fn with_sleeper(generator: G, sleeper: S) -> Self {
        Self {
            generator,
            sleeper,
            policy: RetryPolicy::default(),
            aspect_ratio: TRY_ON_ASPECT_RATIO.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fit the given garments onto the subject.
    pub async fn virtual_try_on(
        &self,
        subject: &ImagePayload,
        garments: &[ImagePayload],
        background: Option<&ImagePayload>,
        palette: Option<&str>,
    ) -> StudioResult<TryOnOutput> {
        let prompt = prompts::try_on_prompt(palette, background.is_some());
        let request = self.build_request(subject, garments, background, &prompt);
        info!(
            garments = garments.len(),
            background = background.is_some(),
            "requesting virtual try-on"
        );
        self.run(&request).await
    }

    /// Synthesize a garment from `description` and fit it, alongside any
    /// reference garments.
    pub async fn custom_try_on(
        &self,
        subject: &ImagePayload,
        description: &str,
        reference_garments: &[ImagePayload],
        background: Option<&ImagePayload>,
        palette: Option<&str>,
    ) -> StudioResult<TryOnOutput> {
        if description.trim().is_empty() {
            return Err(StudioError::validation(
                "description",
                "must not be empty",
                description,
            ));
        }
        let prompt = prompts::custom_prompt(description, palette);
        let request = self.build_request(subject, reference_garments, background, &prompt);
        info!(
            references = reference_garments.len(),
            background = background.is_some(),
            "requesting custom try-on"
        );
        self.run(&request).await
    }

    fn build_request(
        &self,
        subject: &ImagePayload,
        garments: &[ImagePayload],
        background: Option<&ImagePayload>,
        prompt: &str,
    ) -> GenerateContentRequest {
        let images: Vec<&ImagePayload> = std::iter::once(subject)
            .chain(garments.iter())
            .chain(background)
            .collect();
        GenerateContentRequest::new(&images, prompt, Some(&self.aspect_ratio))
    }

    async fn run(&self, request: &GenerateContentRequest) -> StudioResult<TryOnOutput> {
        let generator = &self.generator;
        let response = call_with_retry(&self.policy, &self.sleeper, move || {
            generator.generate_content(request)
        })
        .await
        .map_err(|e| e.with_operation("generate_content"))?;
        extract_result(&response)
    }
}

/// Pull the image and advice out of a generation response.
///
/// Every part of the first candidate is scanned for an inline image; when
/// several carry one, the last wins. A response without parts is a
/// "no response" failure; parts without an image are a "failed to generate
/// image" failure even when advice text came back.
pub fn extract_result(response: &GenerateContentResponse) -> StudioResult<TryOnOutput> {
    let parts = response
        .parts()
        .filter(|parts| !parts.is_empty())
        .ok_or_else(StudioError::no_response)?;
    let advice = response.text().unwrap_or_default();

    let mut image = None;
    for part in parts {
        if let Some(inline) = &part.inline_data {
            image = Some(ImagePayload::new(inline.mime_type.clone(), inline.data.clone()));
        }
    }

    match image {
        Some(image) => {
            debug!(mime = %image.mime_type, advice_len = advice.len(), "extracted try-on image");
            Ok(TryOnOutput { image, advice })
        }
        None => Err(StudioError::no_image(
            Some(advice).filter(|advice| !advice.is_empty()),
        )),
    }
}
