// src/services/providers/openrouter.rs
use crate::config::ProviderSettings;
use crate::errors::GenerationError;
use crate::models::{AspectRatio, AssetPayload, ContentPlanItem, MediaType, Provider, SourceImage};
use crate::services::aspect;
use crate::services::plan_parser::parse_plan;
use crate::services::prompt_builder::{PromptSpec, build_plan_prompt};
use crate::services::providers::http::{ensure_success, read_json, transport_error};
use crate::services::providers::openai::{chat_content, data_uri, generation_payload};
use crate::services::providers::{ImageGenerator, PlanGenerator, VideoGenerator};
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde_json::{Value, json};

const PROVIDER: Provider = Provider::OpenRouter;

pub struct OpenRouterAdapter {
    client: Client,
    api_key: String,
    settings: ProviderSettings,
    referer: String,
    title: String,
}

impl OpenRouterAdapter {
    pub fn new(
        client: Client,
        api_key: String,
        settings: ProviderSettings,
        referer: String,
        title: String,
    ) -> Self {
        Self {
            client,
            api_key,
            settings,
            referer,
            title,
        }
    }

    async fn post_json(
        &self,
        path: &str,
        model: &str,
        capability: &'static str,
        body: &Value,
    ) -> Result<Value, GenerationError> {
        let url = format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, capability, response).await?;
        read_json(PROVIDER, response).await
    }
}

#[async_trait]
impl ImageGenerator for OpenRouterAdapter {
    async fn generate_image(
        &self,
        _source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        // The generations endpoint is text-to-image only.
        let size = aspect::require(PROVIDER, MediaType::Image, ratio)?;
        info!("OpenRouter image generation with {} ({})", model, size);

        let body = json!({
            "model": model,
            "prompt": prompt.text,
            "n": 1,
            "size": size
        });
        let result = self
            .post_json("images/generations", model, "generate images", &body)
            .await?;
        generation_payload(PROVIDER, &result, "image/png")
    }

    fn default_image_model(&self) -> &str {
        &self.settings.image_model
    }
}

#[async_trait]
impl VideoGenerator for OpenRouterAdapter {
    async fn generate_video(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        let aspect_ratio = aspect::require(PROVIDER, MediaType::Video, ratio)?;
        info!("OpenRouter video generation with {} ({})", model, aspect_ratio);

        let body = json!({
            "model": model,
            "prompt": prompt.text,
            "image": data_uri(source),
            "aspect_ratio": aspect_ratio
        });
        let result = self
            .post_json("videos/generations", model, "generate videos", &body)
            .await?;
        generation_payload(PROVIDER, &result, "video/mp4")
    }

    fn default_video_model(&self) -> &str {
        &self.settings.video_model
    }
}

#[async_trait]
impl PlanGenerator for OpenRouterAdapter {
    async fn generate_plan(
        &self,
        niche: &str,
        goal: &str,
        month: &str,
        model: &str,
    ) -> Result<Vec<ContentPlanItem>, GenerationError> {
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": "You are a social media strategist. You output strictly JSON." },
                { "role": "user", "content": build_plan_prompt(niche, goal, month) }
            ],
            "response_format": { "type": "json_object" }
        });
        let result = self
            .post_json("chat/completions", model, "generate content plans", &body)
            .await?;
        parse_plan(&chat_content(PROVIDER, &result)?, PROVIDER)
    }

    fn default_plan_model(&self) -> &str {
        &self.settings.plan_model
    }
}
