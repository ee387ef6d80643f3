// src/services/providers/mod.rs
pub mod gemini;
pub mod http;
pub mod openai;
pub mod openrouter;

use crate::config::{Config, ProviderSettings};
use crate::errors::GenerationError;
use crate::models::{AspectRatio, AssetPayload, ContentPlanItem, Provider, SourceImage};
use crate::services::poller::PollPolicy;
use crate::services::prompt_builder::PromptSpec;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;
pub use openrouter::OpenRouterAdapter;

// Adapters make exactly one attempt per call; retrying is the caller's job.

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError>;

    fn default_image_model(&self) -> &str;
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate_video(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError>;

    fn default_video_model(&self) -> &str;
}

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        niche: &str,
        goal: &str,
        month: &str,
        model: &str,
    ) -> Result<Vec<ContentPlanItem>, GenerationError>;

    fn default_plan_model(&self) -> &str;
}

/// Picks the concrete adapter for a provider once per request.
pub trait AdapterSource: Send + Sync {
    fn image_generator(&self, provider: Provider) -> Result<Arc<dyn ImageGenerator>, GenerationError>;
    fn video_generator(&self, provider: Provider) -> Result<Arc<dyn VideoGenerator>, GenerationError>;
    fn plan_generator(&self, provider: Provider) -> Result<Arc<dyn PlanGenerator>, GenerationError>;

    fn is_configured(&self, provider: Provider) -> bool;
}

/// Builds adapters from explicit configuration. Nothing is cached globally;
/// a changed key only needs a new registry.
pub struct ProviderRegistry {
    config: Arc<Config>,
    client: Client,
}

impl ProviderRegistry {
    /// Client setup failure is a startup fault, not a request error.
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("HTTP client setup failed")?;
        Ok(Self { config, client })
    }

    fn api_key(&self, provider: Provider) -> Result<String, GenerationError> {
        self.config
            .provider(provider)
            .api_key
            .clone()
            .ok_or(GenerationError::MissingCredential {
                provider,
                env_var: provider.key_env_var(),
            })
    }

    fn settings(&self, provider: Provider) -> ProviderSettings {
        self.config.provider(provider).clone()
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.config.poll_interval, self.config.poll_max_wait)
    }

    fn gemini(&self) -> Result<GeminiAdapter, GenerationError> {
        Ok(GeminiAdapter::new(
            self.client.clone(),
            self.api_key(Provider::Gemini)?,
            self.settings(Provider::Gemini),
            self.poll_policy(),
        ))
    }

    fn openai(&self) -> Result<OpenAIAdapter, GenerationError> {
        Ok(OpenAIAdapter::new(
            self.client.clone(),
            self.api_key(Provider::OpenAI)?,
            self.settings(Provider::OpenAI),
            self.poll_policy(),
        ))
    }

    fn openrouter(&self) -> Result<OpenRouterAdapter, GenerationError> {
        Ok(OpenRouterAdapter::new(
            self.client.clone(),
            self.api_key(Provider::OpenRouter)?,
            self.settings(Provider::OpenRouter),
            self.config.openrouter_referer.clone(),
            self.config.openrouter_title.clone(),
        ))
    }
}

impl AdapterSource for ProviderRegistry {
    fn image_generator(&self, provider: Provider) -> Result<Arc<dyn ImageGenerator>, GenerationError> {
        let generator: Arc<dyn ImageGenerator> = match provider {
            Provider::Gemini => Arc::new(self.gemini()?),
            Provider::OpenAI => Arc::new(self.openai()?),
            Provider::OpenRouter => Arc::new(self.openrouter()?),
        };
        Ok(generator)
    }

    fn video_generator(&self, provider: Provider) -> Result<Arc<dyn VideoGenerator>, GenerationError> {
        let generator: Arc<dyn VideoGenerator> = match provider {
            Provider::Gemini => Arc::new(self.gemini()?),
            Provider::OpenAI => Arc::new(self.openai()?),
            Provider::OpenRouter => Arc::new(self.openrouter()?),
        };
        Ok(generator)
    }

    fn plan_generator(&self, provider: Provider) -> Result<Arc<dyn PlanGenerator>, GenerationError> {
        let generator: Arc<dyn PlanGenerator> = match provider {
            Provider::Gemini => Arc::new(self.gemini()?),
            Provider::OpenAI => Arc::new(self.openai()?),
            Provider::OpenRouter => Arc::new(self.openrouter()?),
        };
        Ok(generator)
    }

    fn is_configured(&self, provider: Provider) -> bool {
        self.config.provider(provider).api_key.is_some()
    }
}
