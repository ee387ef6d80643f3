// src/services/generation.rs
use crate::errors::GenerationError;
use crate::models::{AssetPayload, ContentPlan, GeneratedAsset, GenerationRequest, MediaType, PlanRequest};
use crate::services::aspect;
use crate::services::asset_store::{AssetStore, BlobStore, PlanStore};
use crate::services::normalizer::normalize;
use crate::services::prompt_builder::PromptSpec;
use crate::services::providers::AdapterSource;
use crate::services::retry::{RetryPolicy, with_retry};
use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

/// Entry points behind the HTTP surface: one call, one canonical asset or one typed error.
pub struct GenerationService {
    adapters: Arc<dyn AdapterSource>,
    retry: RetryPolicy,
    assets: Arc<AssetStore>,
    plans: Arc<PlanStore>,
}

impl GenerationService {
    pub fn new(
        adapters: Arc<dyn AdapterSource>,
        retry: RetryPolicy,
        assets: Arc<AssetStore>,
        plans: Arc<PlanStore>,
    ) -> Self {
        Self {
            adapters,
            retry,
            assets,
            plans,
        }
    }

    pub fn adapters(&self) -> &Arc<dyn AdapterSource> {
        &self.adapters
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        self.assets.blobs()
    }

    pub fn plans(&self) -> &Arc<PlanStore> {
        &self.plans
    }

    pub async fn generate_shot(&self, request: GenerationRequest) -> Result<GeneratedAsset, GenerationError> {
        self.run_shot(&request).await.inspect_err(|e| {
            error!("{} shot generation failed: {}", request.provider, e);
        })
    }

    async fn run_shot(&self, request: &GenerationRequest) -> Result<GeneratedAsset, GenerationError> {
        aspect::require(request.provider, MediaType::Image, request.aspect_ratio)?;
        let generator = self.adapters.image_generator(request.provider)?;
        let model = resolve_model(request.model_id.as_deref(), generator.default_image_model());
        let prompt = PromptSpec::image(
            request.theme,
            request.category,
            request.media_type,
            request.custom_prompt.as_deref(),
        );

        info!(
            "Dispatching image generation to {} with model {}",
            request.provider, model
        );
        let label = format!("{} image generation", request.provider);
        let payload = with_retry(&self.retry, &label, || {
            generator.generate_image(&request.source_image, &prompt, request.aspect_ratio, &model)
        })
        .await?;

        self.store(request, MediaType::Image, model, prompt.text, payload)
            .await
    }

    pub async fn generate_video_ad(&self, request: GenerationRequest) -> Result<GeneratedAsset, GenerationError> {
        self.run_video(&request).await.inspect_err(|e| {
            error!("{} video generation failed: {}", request.provider, e);
        })
    }

    async fn run_video(&self, request: &GenerationRequest) -> Result<GeneratedAsset, GenerationError> {
        aspect::require(request.provider, MediaType::Video, request.aspect_ratio)?;
        let generator = self.adapters.video_generator(request.provider)?;
        let model = resolve_model(request.model_id.as_deref(), generator.default_video_model());
        let prompt = PromptSpec::video(
            request.theme,
            request.category,
            request.custom_prompt.as_deref(),
        );

        info!(
            "Dispatching video generation to {} with model {}",
            request.provider, model
        );
        let label = format!("{} video generation", request.provider);
        let payload = with_retry(&self.retry, &label, || {
            generator.generate_video(&request.source_image, &prompt, request.aspect_ratio, &model)
        })
        .await?;

        self.store(request, MediaType::Video, model, prompt.text, payload)
            .await
    }

    async fn store(
        &self,
        request: &GenerationRequest,
        media_type: MediaType,
        model: String,
        prompt: String,
        payload: AssetPayload,
    ) -> Result<GeneratedAsset, GenerationError> {
        let normalized = normalize(payload, request.provider, self.assets.blobs()).await?;
        let asset = GeneratedAsset {
            id: self.assets.next_id(),
            url: normalized.url,
            theme: request.theme,
            category: request.category,
            ratio: request.aspect_ratio,
            media_type,
            provider: request.provider,
            model,
            prompt,
            mime_type: normalized.mime_type,
            blob_id: normalized.blob_id,
            timestamp: Utc::now(),
        };
        self.assets.prepend(asset.clone()).await;
        info!("Stored {} asset {} from {}", media_type, asset.id, asset.provider);
        Ok(asset)
    }

    pub async fn generate_content_plan(&self, request: PlanRequest) -> Result<Arc<ContentPlan>, GenerationError> {
        let niche = required("niche", &request.niche)?;
        let goal = required("goal", &request.goal)?;
        let month = required("month", &request.month)?;

        let generator = self.adapters.plan_generator(request.provider)?;
        let model = resolve_model(request.model.as_deref(), generator.default_plan_model());
        info!("Requesting content plan from {} with model {}", request.provider, model);

        let label = format!("{} content plan", request.provider);
        let items = with_retry(&self.retry, &label, || {
            generator.generate_plan(niche, goal, month, &model)
        })
        .await
        .inspect_err(|e| error!("{} content plan failed: {}", request.provider, e))?;

        let plan = ContentPlan {
            niche: niche.to_string(),
            goal: goal.to_string(),
            month: month.to_string(),
            provider: request.provider,
            model,
            items,
            created_at: Utc::now(),
        };
        Ok(self.plans.replace(plan).await)
    }

    pub async fn list_assets(&self) -> Arc<Vec<GeneratedAsset>> {
        self.assets.list().await
    }

    pub async fn remove_asset(&self, id: &str) -> Option<GeneratedAsset> {
        self.assets.remove(id).await
    }

    pub async fn clear_assets(&self) -> usize {
        self.assets.clear().await
    }
}

fn resolve_model(requested: Option<&str>, default: &str) -> String {
    requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, GenerationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}
