//! Runtime configuration for the orchestrator.
//!
//! Provider credentials and endpoints live in one explicit struct that is
//! injected into the orchestrator at construction. Environment lookups happen
//! only in `from_env()`, called from the binary entry point — executors never
//! read the environment themselves.

use crate::errors::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Gemini API key for brief, scene-extraction, and playbook text generation.
    pub gemini_api_key: Option<String>,
    /// OpenAI API key for DALL-E storyboard image generation.
    pub openai_api_key: Option<String>,
    /// fal.ai API key for Veo image-to-video generation.
    pub fal_api_key: Option<String>,
    /// Endpoint of the video concatenation service.
    pub concat_endpoint: Option<String>,
}

impl OrchestratorConfig {
    /// Read configuration from the environment. Missing values are left as
    /// `None`; they only become an error when the corresponding adapter is
    /// constructed.
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            fal_api_key: std::env::var("FAL_AI_API_KEY").ok(),
            concat_endpoint: std::env::var("CONCAT_ENDPOINT").ok(),
        }
    }

    pub fn require_gemini_key(&self) -> Result<&str, PipelineError> {
        self.gemini_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::Configuration("Gemini API key not configured".into()))
    }

    pub fn require_openai_key(&self) -> Result<&str, PipelineError> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::Configuration("OpenAI API key not configured".into()))
    }

    pub fn require_fal_key(&self) -> Result<&str, PipelineError> {
        self.fal_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::Configuration("Fal.ai API key not configured".into()))
    }

    pub fn require_concat_endpoint(&self) -> Result<&str, PipelineError> {
        self.concat_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("Concatenation endpoint not configured".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_are_configuration_errors() {
        let config = OrchestratorConfig::default();
        assert!(matches!(
            config.require_gemini_key(),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            config.require_openai_key(),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            config.require_fal_key(),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            config.require_concat_endpoint(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = OrchestratorConfig {
            gemini_api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.require_gemini_key().is_err());
    }

    #[test]
    fn present_keys_pass_through() {
        let config = OrchestratorConfig {
            gemini_api_key: Some("g-key".into()),
            openai_api_key: Some("o-key".into()),
            fal_api_key: Some("f-key".into()),
            concat_endpoint: Some("https://concat.example".into()),
        };
        assert_eq!(config.require_gemini_key().unwrap(), "g-key");
        assert_eq!(config.require_openai_key().unwrap(), "o-key");
        assert_eq!(config.require_fal_key().unwrap(), "f-key");
        assert_eq!(
            config.require_concat_endpoint().unwrap(),
            "https://concat.example"
        );
    }
}
