// src/services/providers/gemini.rs
use crate::config::ProviderSettings;
use crate::errors::GenerationError;
use crate::models::{AspectRatio, AssetPayload, ContentPlanItem, MediaType, Provider, SourceImage};
use crate::services::aspect;
use crate::services::plan_parser::parse_plan;
use crate::services::poller::{OperationState, PollPolicy, poll_operation};
use crate::services::prompt_builder::{PromptSpec, build_plan_prompt};
use crate::services::providers::http::{
    classify_status, ensure_success, malformed, read_json, transport_error,
};
use crate::services::providers::{ImageGenerator, PlanGenerator, VideoGenerator};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const PROVIDER: Provider = Provider::Gemini;
const API_KEY_HEADER: &str = "x-goog-api-key";

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

pub struct GeminiAdapter {
    client: Client,
    api_key: String,
    settings: ProviderSettings,
    poll: PollPolicy,
}

type VideoOutcome = Result<String, GenerationError>;

impl GeminiAdapter {
    pub fn new(
        client: Client,
        api_key: String,
        settings: ProviderSettings,
        poll: PollPolicy,
    ) -> Self {
        Self {
            client,
            api_key,
            settings,
            poll,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(
        &self,
        path: &str,
        model: &str,
        capability: &'static str,
        body: &Value,
    ) -> Result<Value, GenerationError> {
        let response = self
            .client
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, capability, response).await?;
        read_json(PROVIDER, response).await
    }

    async fn query_operation(&self, name: &str, model: &str) -> Result<OperationState<VideoOutcome>, GenerationError> {
        let response = self
            .client
            .get(self.url(name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, "generate videos", response).await?;
        let operation = read_json(PROVIDER, response).await?;
        Ok(operation_state(&operation, model))
    }

    async fn download(&self, uri: &str, model: &str) -> Result<AssetPayload, GenerationError> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, "generate videos", response).await?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        Ok(AssetPayload::Binary { bytes, mime_type })
    }

    // A finished operation is never resubmitted; transient fetch failures are
    // retried here against the completed URI within the poll budget.
    async fn fetch_finished(&self, uri: &str, model: &str) -> Result<AssetPayload, GenerationError> {
        match self.download(uri, model).await {
            Err(error) if error.is_retryable() => {
                warn!("Veo video download failed, retrying: {}", error);
                poll_operation(&self.poll, PROVIDER, OperationState::Pending, move || async move {
                    self.download(uri, model).await.map(OperationState::Done)
                })
                .await
            }
            other => other,
        }
    }
}

fn inline_part(source: &SourceImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": source.mime_type,
            "data": general_purpose::STANDARD.encode(&source.data)
        }
    })
}

/// Rejects responses the safety filters stopped, returning the first candidate's parts.
fn candidate_parts(result: &Value) -> Result<&Vec<Value>, GenerationError> {
    if let Some(reason) = result["promptFeedback"]["blockReason"].as_str() {
        return Err(GenerationError::ContentBlocked {
            provider: PROVIDER,
            reason: format!("prompt blocked ({})", reason),
        });
    }

    let candidate = result["candidates"]
        .get(0)
        .ok_or_else(|| malformed(PROVIDER, "response contained no candidates"))?;

    if let Some(reason) = candidate["finishReason"].as_str() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(GenerationError::ContentBlocked {
                provider: PROVIDER,
                reason: format!("generation stopped ({})", reason),
            });
        }
    }

    candidate["content"]["parts"]
        .as_array()
        .ok_or_else(|| malformed(PROVIDER, "candidate had no content parts"))
}

fn joined_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("")
}

fn operation_error(error: &Value, model: &str) -> GenerationError {
    let code = error["code"].as_i64().unwrap_or(0);
    let message = error["message"]
        .as_str()
        .unwrap_or("video operation failed")
        .to_string();
    // google.rpc.Code values; HTTP codes are classified the usual way.
    match code {
        8 => GenerationError::RateLimited {
            provider: PROVIDER,
            message,
        },
        4 | 13 | 14 => GenerationError::ProviderUnreachable {
            provider: PROVIDER,
            message,
        },
        7 | 16 => GenerationError::InvalidCredential {
            provider: PROVIDER,
            message,
        },
        3 => classify_status(
            PROVIDER,
            model,
            "generate videos",
            StatusCode::BAD_REQUEST,
            &error.to_string(),
        ),
        other => match u16::try_from(other).ok().and_then(|c| StatusCode::from_u16(c).ok()) {
            Some(status) if other >= 400 => {
                classify_status(PROVIDER, model, "generate videos", status, &error.to_string())
            }
            _ => GenerationError::ProviderRejected {
                provider: PROVIDER,
                status: 0,
                message,
            },
        },
    }
}

fn operation_state(operation: &Value, model: &str) -> OperationState<VideoOutcome> {
    if !operation["done"].as_bool().unwrap_or(false) {
        return OperationState::Pending;
    }
    if operation["error"].is_object() {
        return OperationState::Done(Err(operation_error(&operation["error"], model)));
    }

    let response = &operation["response"]["generateVideoResponse"];
    if let Some(reasons) = response["raiMediaFilteredReasons"].as_array() {
        if !reasons.is_empty() {
            let reason = reasons
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; ");
            return OperationState::Done(Err(GenerationError::ContentBlocked {
                provider: PROVIDER,
                reason,
            }));
        }
    }

    let uri = response["generatedSamples"][0]["video"]["uri"]
        .as_str()
        .or_else(|| operation["response"]["generatedVideos"][0]["video"]["uri"].as_str());

    OperationState::Done(match uri {
        Some(uri) if !uri.is_empty() => Ok(uri.to_string()),
        _ => Err(malformed(
            PROVIDER,
            "finished video operation did not include a video URI",
        )),
    })
}

#[async_trait]
impl ImageGenerator for GeminiAdapter {
    async fn generate_image(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        let aspect_ratio = aspect::require(PROVIDER, MediaType::Image, ratio)?;
        info!("Gemini image generation with {} ({})", model, aspect_ratio);

        let body = json!({
            "contents": [{
                "parts": [inline_part(source), { "text": prompt.text }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"],
                "imageConfig": { "aspectRatio": aspect_ratio }
            }
        });

        let result = self
            .post_json(
                &format!("models/{}:generateContent", model),
                model,
                "generate images",
                &body,
            )
            .await?;
        let parts = candidate_parts(&result)?;

        if let Some(inline) = parts.iter().find_map(|p| p.get("inlineData")) {
            let data = inline["data"]
                .as_str()
                .ok_or_else(|| malformed(PROVIDER, "inline image had no data"))?;
            let mime_type = inline["mimeType"].as_str().unwrap_or("image/png");
            return Ok(AssetPayload::Inline {
                data_base64: data.to_string(),
                mime_type: mime_type.to_string(),
            });
        }

        let text = joined_text(parts);
        if !text.trim().is_empty() {
            return Err(GenerationError::UnsupportedCapability {
                model: model.to_string(),
                capability: "generate images",
                detail: "the model answered with text instead of an image".to_string(),
            });
        }
        Err(malformed(PROVIDER, "response contained no image data"))
    }

    fn default_image_model(&self) -> &str {
        &self.settings.image_model
    }
}

#[async_trait]
impl VideoGenerator for GeminiAdapter {
    async fn generate_video(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        let aspect_ratio = aspect::require(PROVIDER, MediaType::Video, ratio)?;
        info!("Submitting Veo video job with {} ({})", model, aspect_ratio);

        let body = json!({
            "instances": [{
                "prompt": prompt.text,
                "image": {
                    "bytesBase64Encoded": general_purpose::STANDARD.encode(&source.data),
                    "mimeType": source.mime_type
                }
            }],
            "parameters": {
                "aspectRatio": aspect_ratio,
                "resolution": "720p",
                "sampleCount": 1
            }
        });

        let operation = self
            .post_json(
                &format!("models/{}:predictLongRunning", model),
                model,
                "generate videos",
                &body,
            )
            .await?;
        let name = operation["name"]
            .as_str()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed(PROVIDER, "video submission returned no operation name"))?
            .to_string();
        info!("Veo operation {} submitted", name);

        let uri = poll_operation(
            &self.poll,
            PROVIDER,
            operation_state(&operation, model),
            || self.query_operation(&name, model),
        )
        .await??;

        info!("Veo operation {} finished, downloading video", name);
        self.fetch_finished(&uri, model).await
    }

    fn default_video_model(&self) -> &str {
        &self.settings.video_model
    }
}

#[async_trait]
impl PlanGenerator for GeminiAdapter {
    async fn generate_plan(
        &self,
        niche: &str,
        goal: &str,
        month: &str,
        model: &str,
    ) -> Result<Vec<ContentPlanItem>, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_plan_prompt(niche, goal, month) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "day": { "type": "INTEGER" },
                            "type": { "type": "STRING", "enum": ["Post", "Reel", "Story"] },
                            "title": { "type": "STRING" },
                            "caption": { "type": "STRING" },
                            "visualIdea": { "type": "STRING" }
                        },
                        "required": ["day", "type", "title", "caption", "visualIdea"]
                    }
                }
            }
        });

        let result = self
            .post_json(
                &format!("models/{}:generateContent", model),
                model,
                "generate content plans",
                &body,
            )
            .await?;
        let text = joined_text(candidate_parts(&result)?);
        parse_plan(&text, PROVIDER)
    }

    fn default_plan_model(&self) -> &str {
        &self.settings.plan_model
    }
}
