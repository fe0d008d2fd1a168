//! Generation provider adapters.
//!
//! Each external service sits behind a small trait with a uniform failure
//! taxonomy, so step executors never see provider-specific wire formats and
//! tests can substitute in-process fakes.

pub mod concat;
pub mod dalle;
pub mod gemini;
pub mod veo;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use concat::ConcatClient;
pub use dalle::DalleImageGenerator;
pub use gemini::GeminiTextGenerator;
pub use veo::VeoVideoGenerator;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider indicated a quota or rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider returned a non-success response.
    #[error("{0}")]
    Failed(String),

    /// The request never got a usable response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// Classify a non-success provider response body. Quota and rate-limit
    /// wording becomes `RateLimited` so callers can present "try again later".
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let lowered = body.to_lowercase();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || lowered.contains("rate limit")
            || lowered.contains("quota")
        {
            Self::RateLimited(body.to_string())
        } else {
            Self::Failed(format!("{}: {}", status, body))
        }
    }
}

/// Sampling options for a text-generation call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    /// Creative output (briefs, playbooks).
    pub fn creative() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }

    /// Structured extraction (scene prompt lists).
    pub fn extraction() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

/// Size and quality of a storyboard image request.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub size: String,
    pub quality: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        // Cinematic 16:9 storyboard frame.
        Self {
            size: "1792x1024".into(),
            quality: "hd".into(),
        }
    }
}

/// The two clip configuration profiles. Draft previews are short, low
/// quality, and looping; final renders are longer, high quality, non-looping.
#[derive(Debug, Clone)]
pub struct ClipSpec {
    pub duration_secs: f64,
    pub quality: String,
    pub looping: bool,
}

impl ClipSpec {
    pub fn draft() -> Self {
        Self {
            duration_secs: 2.0,
            quality: "low".into(),
            looping: true,
        }
    }

    pub fn final_render() -> Self {
        Self {
            duration_secs: 4.0,
            quality: "high".into(),
            looping: false,
        }
    }
}

/// Outcome of starting an image-to-video generation: some providers answer
/// synchronously, others queue the request for polling.
#[derive(Debug, Clone)]
pub enum VideoJob {
    Completed { video_url: String },
    Queued { request_id: String },
}

/// Status of a queued video generation request.
#[derive(Debug, Clone)]
pub enum VideoJobStatus {
    Pending,
    Completed { video_url: String },
    Failed { reason: String },
}

/// Result of concatenating clips into the final video.
#[derive(Debug, Clone)]
pub struct ConcatOutput {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the reference (URL) of the generated image.
    async fn generate(&self, prompt: &str, spec: &ImageSpec) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Start an image-to-video generation for one frame.
    async fn start(
        &self,
        image_url: &str,
        prompt: &str,
        spec: &ClipSpec,
    ) -> Result<VideoJob, ProviderError>;

    /// Check a queued request. Used only through the poller.
    async fn check(&self, request_id: &str) -> Result<VideoJobStatus, ProviderError>;
}

#[async_trait]
pub trait VideoConcatenator: Send + Sync {
    async fn concatenate(
        &self,
        clip_urls: &[String],
        audio_url: Option<&str>,
    ) -> Result<ConcatOutput, ProviderError>;
}

/// The full adapter set injected into the orchestrator.
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub video: Arc<dyn VideoGenerator>,
    pub concat: Arc<dyn VideoConcatenator>,
}
