//! Image-to-video generation through the fal.ai Veo REST API.
//!
//! The submit endpoint is asynchronous in practice: it may answer with a
//! finished video URL straight away, or with a request id the caller must
//! poll through `check`.

use async_trait::async_trait;
use serde_json::json;

use super::{ClipSpec, ProviderError, VideoGenerator, VideoJob, VideoJobStatus};

const SUBMIT_URL: &str = "https://fal.run/fal-ai/veo-3/preview";
const REQUESTS_URL: &str = "https://fal.run/fal-ai/veo-3/requests";

pub struct VeoVideoGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl VeoVideoGenerator {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }
}

/// The video URL may live under `video.url` or `output.url` depending on the
/// model revision.
fn extract_video_url(data: &serde_json::Value) -> Option<String> {
    data["video"]["url"]
        .as_str()
        .or_else(|| data["output"]["url"].as_str())
        .map(|s| s.to_string())
}

#[async_trait]
impl VideoGenerator for VeoVideoGenerator {
    async fn start(
        &self,
        image_url: &str,
        prompt: &str,
        spec: &ClipSpec,
    ) -> Result<VideoJob, ProviderError> {
        let body = json!({
            "image_url": image_url,
            "prompt": prompt,
            "duration": spec.duration_secs,
            "aspect_ratio": "16:9",
            "loop": spec.looping,
            "quality": spec.quality,
        });

        let resp = self
            .client
            .post(SUBMIT_URL)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let data: serde_json::Value = resp.json().await?;
        if let Some(video_url) = extract_video_url(&data) {
            return Ok(VideoJob::Completed { video_url });
        }
        data["request_id"]
            .as_str()
            .map(|id| VideoJob::Queued {
                request_id: id.to_string(),
            })
            .ok_or_else(|| {
                ProviderError::Failed("Veo response carried neither video nor request id".into())
            })
    }

    async fn check(&self, request_id: &str) -> Result<VideoJobStatus, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/{}", REQUESTS_URL, request_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let data: serde_json::Value = resp.json().await?;
        match data["status"].as_str() {
            Some("completed") => match extract_video_url(&data) {
                Some(video_url) => Ok(VideoJobStatus::Completed { video_url }),
                None => Ok(VideoJobStatus::Failed {
                    reason: "completed without a video URL".into(),
                }),
            },
            Some("failed") => Ok(VideoJobStatus::Failed {
                reason: data["error"]
                    .as_str()
                    .unwrap_or("generation failed")
                    .to_string(),
            }),
            _ => Ok(VideoJobStatus::Pending),
        }
    }
}
