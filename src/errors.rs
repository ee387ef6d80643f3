// src/errors.rs
use crate::models::Provider;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{provider} API key is missing. Set {env_var} in your environment or .env file.")]
    MissingCredential {
        provider: Provider,
        env_var: &'static str,
    },

    #[error("{provider} rejected the configured API key: {message}")]
    InvalidCredential { provider: Provider, message: String },

    #[error("{provider} rate limit reached: {message}")]
    RateLimited { provider: Provider, message: String },

    #[error("{provider} blocked this request for safety reasons: {reason}")]
    ContentBlocked { provider: Provider, reason: String },

    #[error("Malformed response from {provider}: {detail}")]
    MalformedResponse { provider: Provider, detail: String },

    #[error("Model '{model}' cannot {capability}: {detail}. Pick a model that supports it.")]
    UnsupportedCapability {
        model: String,
        capability: &'static str,
        detail: String,
    },

    #[error("Could not reach {provider}: {message}")]
    ProviderUnreachable { provider: Provider, message: String },

    #[error("{provider} rejected the request (HTTP {status}): {message}")]
    ProviderRejected {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("Product analysis failed: {0}")]
    AnalysisFailed(#[source] Box<GenerationError>),

    #[error("{provider} did not finish the video within {waited_secs}s")]
    Timeout { provider: Provider, waited_secs: u64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl GenerationError {
    /// Transient failures worth another attempt after backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. } | GenerationError::ProviderUnreachable { .. } => {
                true
            }
            GenerationError::AnalysisFailed(cause) => cause.is_retryable(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential { .. } => "missing_credential",
            GenerationError::InvalidCredential { .. } => "invalid_credential",
            GenerationError::RateLimited { .. } => "rate_limited",
            GenerationError::ContentBlocked { .. } => "content_blocked",
            GenerationError::MalformedResponse { .. } => "malformed_response",
            GenerationError::UnsupportedCapability { .. } => "unsupported_capability",
            GenerationError::ProviderUnreachable { .. } => "provider_unreachable",
            GenerationError::ProviderRejected { .. } => "provider_rejected",
            GenerationError::AnalysisFailed(_) => "analysis_failed",
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::Validation(_) => "validation",
            GenerationError::ImageProcessing(_) => "image_processing",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            GenerationError::MissingCredential { .. } | GenerationError::InvalidCredential { .. } => {
                "Provider not configured"
            }
            GenerationError::RateLimited { .. } => "Rate limited",
            GenerationError::ContentBlocked { .. } => "Content blocked",
            GenerationError::UnsupportedCapability { .. } => "Unsupported model",
            GenerationError::MalformedResponse { .. }
            | GenerationError::ProviderUnreachable { .. }
            | GenerationError::ProviderRejected { .. } => "AI service error",
            GenerationError::AnalysisFailed(_) => "Analysis failed",
            GenerationError::Timeout { .. } => "Generation timed out",
            GenerationError::Validation(_) => "Validation error",
            GenerationError::ImageProcessing(_) => "Image processing error",
        }
    }
}

impl ResponseError for GenerationError {
    fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::MissingCredential { .. } | GenerationError::InvalidCredential { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GenerationError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GenerationError::ContentBlocked { .. }
            | GenerationError::UnsupportedCapability { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::MalformedResponse { .. }
            | GenerationError::ProviderUnreachable { .. }
            | GenerationError::ProviderRejected { .. } => StatusCode::BAD_GATEWAY,
            GenerationError::AnalysisFailed(cause) => cause.status_code(),
            GenerationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GenerationError::Validation(_) | GenerationError::ImageProcessing(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.title(),
            "kind": self.kind(),
            "message": self.to_string()
        }))
    }
}
