//! Text generation through the Gemini REST API.

use async_trait::async_trait;
use serde_json::json;

use super::{GenerationOptions, ProviderError, TextGenerator};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";

pub struct GeminiTextGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiTextGenerator {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, self.api_key
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": options.temperature,
                "topK": options.top_k,
                "topP": options.top_p,
                "maxOutputTokens": options.max_output_tokens,
            }
        });

        let resp = self.client.post(self.url()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let data: serde_json::Value = resp.json().await?;
        data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::Failed("Gemini response missing candidate text".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_model_and_key() {
        let generator = GeminiTextGenerator::with_model("test-key", "gemini-1.5-pro");
        let url = generator.url();
        assert!(url.contains("gemini-1.5-pro:generateContent"));
        assert!(url.ends_with("key=test-key"));
    }
}
