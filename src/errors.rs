//! Typed error hierarchy for the reelsmith orchestrator.
//!
//! One top-level enum covers the whole pipeline surface. Individual-item
//! failures inside a fan-out (a scene image, a per-frame clip) are handled at
//! the item level by the step executors and never reach this type; what does
//! reach it is fatal for the step that raised it.

use thiserror::Error;

use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing provider credentials or endpoints. Fatal, no retry.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed caller input (no prompt, no frames, ...).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// An adapter call failed or returned non-success.
    #[error("Provider call failed: {message}")]
    Provider { message: String },

    /// The provider indicated a quota or rate limit; callers should present
    /// a "try again later" message rather than a generic failure.
    #[error("Provider rate limited: {message}")]
    RateLimited { message: String },

    /// Step number outside 1-8.
    #[error("Unknown step: {step}")]
    UnknownStep { step: u32 },

    /// Project store failure.
    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl PipelineError {
    /// Stable error code for the control API response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::UnknownStep { .. } => "UNKNOWN_STEP",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited(message) => Self::RateLimited { message },
            other => Self::Provider {
                message: other.to_string(),
            },
        }
    }
}
