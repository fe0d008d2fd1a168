//! Client for the video concatenation service.
//!
//! The service is treated as synchronous: one request in, the final video
//! reference (and a thumbnail) out.

use async_trait::async_trait;
use serde_json::json;

use super::{ConcatOutput, ProviderError, VideoConcatenator};

pub struct ConcatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ConcatClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VideoConcatenator for ConcatClient {
    async fn concatenate(
        &self,
        clip_urls: &[String],
        audio_url: Option<&str>,
    ) -> Result<ConcatOutput, ProviderError> {
        let body = json!({
            "videoClips": clip_urls,
            "audioTrack": audio_url,
        });

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let data: serde_json::Value = resp.json().await?;
        let video_url = data["data"]["finalVideoUrl"]
            .as_str()
            .or_else(|| data["finalVideoUrl"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::Failed("Concatenation response missing final video URL".into())
            })?;
        let thumbnail_url = data["data"]["thumbnailUrl"]
            .as_str()
            .or_else(|| data["thumbnailUrl"].as_str())
            .map(|s| s.to_string());

        Ok(ConcatOutput {
            video_url,
            thumbnail_url,
        })
    }
}
