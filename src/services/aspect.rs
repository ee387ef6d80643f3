// src/services/aspect.rs
//! Canonical aspect-ratio compatibility table shared by every adapter.
//!
//! `None` means the combination is not offered; it is rejected before any
//! adapter is called and reported as disabled through `/api/v1/options`.

use crate::errors::GenerationError;
use crate::models::{AspectRatio, MediaType, Provider};

pub fn resolve(provider: Provider, media_type: MediaType, ratio: AspectRatio) -> Option<&'static str> {
    use AspectRatio::*;

    match (provider, media_type) {
        // Gemini image config takes the ratio string as-is.
        (Provider::Gemini, MediaType::Image) => Some(ratio.as_str()),
        (Provider::Gemini, MediaType::Video) | (Provider::OpenRouter, MediaType::Video) => {
            match ratio {
                Wide | Vertical => Some(ratio.as_str()),
                Square | Portrait | Landscape => None,
            }
        }
        (Provider::OpenAI, MediaType::Image) | (Provider::OpenRouter, MediaType::Image) => {
            Some(match ratio {
                Square => "1024x1024",
                Portrait | Vertical => "1024x1792",
                Landscape | Wide => "1792x1024",
            })
        }
        (Provider::OpenAI, MediaType::Video) => match ratio {
            Wide => Some("1280x720"),
            Vertical => Some("720x1280"),
            Square | Portrait | Landscape => None,
        },
    }
}

pub fn supported_ratios(provider: Provider, media_type: MediaType) -> Vec<AspectRatio> {
    AspectRatio::ALL
        .into_iter()
        .filter(|ratio| resolve(provider, media_type, *ratio).is_some())
        .collect()
}

pub fn require(
    provider: Provider,
    media_type: MediaType,
    ratio: AspectRatio,
) -> Result<&'static str, GenerationError> {
    resolve(provider, media_type, ratio).ok_or_else(|| {
        GenerationError::Validation(format!(
            "{provider} does not support {ratio} for {media_type} generation"
        ))
    })
}

/// Image size for a specific OpenAI model. The gpt-image family only accepts
/// 1024x1024, 1024x1536 and 1536x1024; every other model uses the table above.
pub fn image_size_for_model(
    provider: Provider,
    ratio: AspectRatio,
    model: &str,
) -> Result<&'static str, GenerationError> {
    use AspectRatio::*;

    let size = require(provider, MediaType::Image, ratio)?;
    if provider == Provider::OpenAI && model.to_ascii_lowercase().starts_with("gpt-image") {
        return Ok(match ratio {
            Square => "1024x1024",
            Portrait | Vertical => "1024x1536",
            Landscape | Wide => "1536x1024",
        });
    }
    Ok(size)
}

/// Splits a `WxH` size token into pixel dimensions.
pub fn pixel_size(token: &str) -> Option<(u32, u32)> {
    let (width, height) = token.split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?))
}
