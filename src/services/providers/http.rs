// src/services/providers/http.rs
use crate::errors::GenerationError;
use crate::models::Provider;
use reqwest::{Response, StatusCode};
use serde_json::Value;

const MAX_ERROR_CHARS: usize = 300;

pub fn transport_error(provider: Provider, err: reqwest::Error) -> GenerationError {
    GenerationError::ProviderUnreachable {
        provider,
        message: err.to_string(),
    }
}

/// Pulls `error.message` (or a plain `error`/`message` string) out of a JSON
/// error body, falling back to the trimmed raw text.
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v["error"]["message"]
            .as_str()
            .or_else(|| v["error"].as_str())
            .or_else(|| v["message"].as_str())
            .map(str::to_string)
    });

    let message = from_json.unwrap_or_else(|| body.split_whitespace().collect::<Vec<_>>().join(" "));
    if message.chars().count() > MAX_ERROR_CHARS {
        let truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}

fn mentions_safety(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("content_policy")
        || lower.contains("safety")
        || lower.contains("moderation")
        || lower.contains("responsible ai")
}

pub fn classify_status(
    provider: Provider,
    model: &str,
    capability: &'static str,
    status: StatusCode,
    body: &str,
) -> GenerationError {
    let mut message = extract_error_message(body);
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }

    match status.as_u16() {
        401 | 403 => GenerationError::InvalidCredential { provider, message },
        429 => GenerationError::RateLimited { provider, message },
        408 | 500..=599 => GenerationError::ProviderUnreachable { provider, message },
        404 => GenerationError::UnsupportedCapability {
            model: model.to_string(),
            capability,
            detail: message,
        },
        400 if mentions_safety(body) => GenerationError::ContentBlocked {
            provider,
            reason: message,
        },
        code => GenerationError::ProviderRejected {
            provider,
            status: code,
            message,
        },
    }
}

/// Passes successful responses through and converts failures into the error taxonomy.
pub async fn ensure_success(
    provider: Provider,
    model: &str,
    capability: &'static str,
    response: Response,
) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(provider, model, capability, status, &body))
}

pub async fn read_json(provider: Provider, response: Response) -> Result<Value, GenerationError> {
    response
        .json::<Value>()
        .await
        .map_err(|e| GenerationError::MalformedResponse {
            provider,
            detail: format!("response was not valid JSON: {}", e),
        })
}

pub fn malformed(provider: Provider, detail: impl Into<String>) -> GenerationError {
    GenerationError::MalformedResponse {
        provider,
        detail: detail.into(),
    }
}
