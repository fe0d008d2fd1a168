//! Storyboard image generation through the OpenAI images REST API.

use async_trait::async_trait;
use serde_json::json;

use super::{ImageGenerator, ImageSpec, ProviderError};

const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const MODEL: &str = "dall-e-3";

pub struct DalleImageGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl DalleImageGenerator {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for DalleImageGenerator {
    async fn generate(&self, prompt: &str, spec: &ImageSpec) -> Result<String, ProviderError> {
        let body = json!({
            "model": MODEL,
            "prompt": prompt,
            "size": spec.size,
            "quality": spec.quality,
            "n": 1,
        });

        let resp = self
            .client
            .post(IMAGES_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let data: serde_json::Value = resp.json().await?;
        data["data"][0]["url"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::Failed("DALL-E response missing image URL".to_string()))
    }
}
