// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThemeStyle {
    CleanStudio,
    CozyLiving,
    NatureOutdoor,
    LuxuryDark,
    KitchenBright,
    MinimalistPastel,
    Industrial,
}

impl ThemeStyle {
    pub const ALL: [ThemeStyle; 7] = [
        ThemeStyle::CleanStudio,
        ThemeStyle::CozyLiving,
        ThemeStyle::NatureOutdoor,
        ThemeStyle::LuxuryDark,
        ThemeStyle::KitchenBright,
        ThemeStyle::MinimalistPastel,
        ThemeStyle::Industrial,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ThemeStyle::CleanStudio => "Clean Studio",
            ThemeStyle::CozyLiving => "Cozy Living Room",
            ThemeStyle::NatureOutdoor => "Nature & Outdoors",
            ThemeStyle::LuxuryDark => "Luxury Dark",
            ThemeStyle::KitchenBright => "Bright Kitchen",
            ThemeStyle::MinimalistPastel => "Minimalist Pastel",
            ThemeStyle::Industrial => "Industrial Concrete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    #[default]
    General,
    Perfume,
    Food,
    Fashion,
    Electronics,
    Furniture,
    Toys,
    Footwear,
    Jewelry,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 9] = [
        ProductCategory::General,
        ProductCategory::Perfume,
        ProductCategory::Food,
        ProductCategory::Fashion,
        ProductCategory::Electronics,
        ProductCategory::Furniture,
        ProductCategory::Toys,
        ProductCategory::Footwear,
        ProductCategory::Jewelry,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProductCategory::General => "General Product",
            ProductCategory::Perfume => "Perfume & Beauty",
            ProductCategory::Food => "Food & Beverage",
            ProductCategory::Fashion => "Fashion & Accessories",
            ProductCategory::Electronics => "Electronics",
            ProductCategory::Furniture => "Furniture & Home",
            ProductCategory::Toys => "Toys & Games",
            ProductCategory::Footwear => "Footwear",
            ProductCategory::Jewelry => "Jewelry & Watches",
        }
    }

    /// Noun used to name the product inside prompts.
    pub fn subject(&self) -> &'static str {
        match self {
            ProductCategory::General => "product",
            ProductCategory::Perfume => "perfume bottle",
            ProductCategory::Food => "food product",
            ProductCategory::Fashion => "fashion accessory",
            ProductCategory::Electronics => "electronic device",
            ProductCategory::Furniture => "furniture piece",
            ProductCategory::Toys => "toy",
            ProductCategory::Footwear => "shoe",
            ProductCategory::Jewelry => "jewelry piece",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Vertical,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Wide,
        AspectRatio::Vertical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Wide => "16:9",
            AspectRatio::Vertical => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => f.write_str("image"),
            MediaType::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Gemini, Provider::OpenAI, Provider::OpenRouter];

    pub fn key_env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => f.write_str("Google Gemini"),
            Provider::OpenAI => f.write_str("OpenAI"),
            Provider::OpenRouter => f.write_str("OpenRouter"),
        }
    }
}

/// Decoded upload handed to adapters; never carries a data-URI prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub data: Bytes,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_image: SourceImage,
    pub theme: Option<ThemeStyle>,
    pub category: ProductCategory,
    pub aspect_ratio: AspectRatio,
    pub media_type: MediaType,
    pub provider: Provider,
    pub model_id: Option<String>,
    pub custom_prompt: Option<String>,
}

/// Success shapes an adapter can hand back before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPayload {
    Inline { data_base64: String, mime_type: String },
    Remote { url: String, mime_type: String },
    Binary { bytes: Bytes, mime_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedAsset {
    pub id: String,
    pub url: String,
    pub theme: Option<ThemeStyle>,
    pub category: ProductCategory,
    pub ratio: AspectRatio,
    pub media_type: MediaType,
    pub provider: Provider,
    pub model: String,
    pub prompt: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(alias = "post", alias = "POST")]
    Post,
    #[serde(alias = "reel", alias = "REEL")]
    Reel,
    #[serde(alias = "story", alias = "STORY")]
    Story,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentPlanItem {
    pub day: u32,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub caption: String,
    #[serde(rename = "visualIdea", alias = "visual_idea")]
    pub visual_idea: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub niche: String,
    pub goal: String,
    pub month: String,
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPlan {
    pub niche: String,
    pub goal: String,
    pub month: String,
    pub provider: Provider,
    pub model: String,
    pub items: Vec<ContentPlanItem>,
    pub created_at: DateTime<Utc>,
}
