// src/config.rs
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Provider;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub video_model: String,
    pub plan_model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
    pub openrouter: ProviderSettings,
    pub openrouter_referer: String,
    pub openrouter_title: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub poll_interval: Duration,
    pub poll_max_wait: Duration,
    pub http_timeout: Duration,
    pub max_image_dimension: u32,
    pub frontend_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let gemini = ProviderSettings {
            api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
            base_url: or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            image_model: or("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            video_model: or("GEMINI_VIDEO_MODEL", "veo-3.0-fast-generate-001"),
            plan_model: or("GEMINI_PLAN_MODEL", "gemini-2.5-flash"),
        };
        let openai = ProviderSettings {
            api_key: get("OPENAI_API_KEY"),
            base_url: or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            image_model: or("OPENAI_IMAGE_MODEL", "dall-e-3"),
            video_model: or("OPENAI_VIDEO_MODEL", "sora-2"),
            plan_model: or("OPENAI_PLAN_MODEL", "gpt-4o"),
        };
        let openrouter = ProviderSettings {
            api_key: get("OPENROUTER_API_KEY"),
            base_url: or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            image_model: or(
                "OPENROUTER_IMAGE_MODEL",
                "sourceful/riverflow-v2-fast-preview",
            ),
            video_model: or("OPENROUTER_VIDEO_MODEL", "openai/sora-2"),
            plan_model: or("OPENROUTER_PLAN_MODEL", "openai/gpt-4o-mini"),
        };

        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
                None => Ok(default),
            }
        };

        let positive = |key: &str, default: u64| -> Result<u64> {
            let value = number(key, default)?;
            anyhow::ensure!(value > 0, "{key} must be greater than zero");
            Ok(value)
        };
        let small = |value: u64, key: &str| -> Result<u32> {
            u32::try_from(value).with_context(|| format!("{key} is too large, got {value}"))
        };

        Ok(Self {
            bind_addr: or("BIND_ADDR", "0.0.0.0:8080"),
            gemini,
            openai,
            openrouter,
            openrouter_referer: or("OPENROUTER_REFERER", "http://localhost:8080"),
            openrouter_title: or("OPENROUTER_TITLE", "Marketplace Magic"),
            retry_max_attempts: small(number("RETRY_MAX_ATTEMPTS", 3)?, "RETRY_MAX_ATTEMPTS")?.max(1),
            retry_base_delay: Duration::from_millis(number("RETRY_BASE_DELAY_MS", 2000)?),
            poll_interval: Duration::from_secs(number("VIDEO_POLL_INTERVAL_SECS", 5)?),
            poll_max_wait: Duration::from_secs(number("VIDEO_MAX_WAIT_SECS", 600)?),
            http_timeout: Duration::from_secs(positive("HTTP_TIMEOUT_SECS", 120)?),
            max_image_dimension: small(positive("MAX_IMAGE_DIMENSION", 2048)?, "MAX_IMAGE_DIMENSION")?,
            frontend_dir: get("FRONTEND_DIR").map(PathBuf::from),
        })
    }

    pub fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::OpenAI => &self.openai,
            Provider::OpenRouter => &self.openrouter,
        }
    }
}
