// src/services/prompt_builder.rs
use crate::models::{MediaType, ProductCategory, ThemeStyle};

pub const VISION_ANALYSIS_INSTRUCTION: &str = "Describe the MAIN product in this image in extreme detail so a graphic designer could recreate it perfectly. Focus on shape, color, material, texture, packaging details, and any text on labels. Do NOT describe the background. Output the description as a single paragraph.";

const GENERIC_SCENE: &str = "Professional product photography of this {subject}, high quality, photorealistic, 4k.";

const GENERIC_MOTION: &str = "Slow, steady camera push-in toward the {subject} with soft, even lighting and no abrupt cuts.";

fn scene_template(theme: Option<ThemeStyle>) -> &'static str {
    let Some(theme) = theme else {
        return GENERIC_SCENE;
    };
    match theme {
        ThemeStyle::CleanStudio => {
            "Place the {subject} on a clean, seamless white background with soft, professional studio lighting. Soft shadows, high key photography, commercial e-commerce style."
        }
        ThemeStyle::CozyLiving => {
            "Place the {subject} in a cozy, warm living room setting. Blurred background with a sofa or coffee table, warm lighting, lifestyle photography, photorealistic."
        }
        ThemeStyle::NatureOutdoor => {
            "Place the {subject} in a natural outdoor setting with rocks, moss, or wood. Natural sunlight, depth of field, organic feel, fresh atmosphere."
        }
        ThemeStyle::LuxuryDark => {
            "Place the {subject} on a dark marble or slate surface. Dramatic lighting, gold or metallic accents in the background, luxury brand aesthetic, high contrast."
        }
        ThemeStyle::KitchenBright => {
            "Place the {subject} on a clean kitchen counter. Bright morning light, subtle kitchen props in background (blurred), fresh and airy atmosphere."
        }
        ThemeStyle::MinimalistPastel => {
            "Place the {subject} on a solid pastel colored background with geometric props. Minimalist composition, soft lighting, trendy art direction."
        }
        ThemeStyle::Industrial => {
            "Place the {subject} in an industrial setting with concrete textures and steel elements. Cool toned lighting, sharp details, modern urban look."
        }
    }
}

// Camera and light movement per theme; not derived from the still templates.
fn motion_template(theme: Option<ThemeStyle>) -> &'static str {
    let Some(theme) = theme else {
        return GENERIC_MOTION;
    };
    match theme {
        ThemeStyle::CleanStudio => {
            "The {subject} rotates slowly on a seamless white turntable while a soft key light sweeps across it, clean reflections gliding over the surface."
        }
        ThemeStyle::CozyLiving => {
            "Gentle handheld dolly toward the {subject} on a coffee table, warm lamp light flickering softly, background sofa drifting in and out of focus."
        }
        ThemeStyle::NatureOutdoor => {
            "Slow orbit around the {subject} resting on mossy rock, dappled sunlight moving through leaves, a light breeze animating the foliage."
        }
        ThemeStyle::LuxuryDark => {
            "Low-angle slider move across dark marble revealing the {subject}, a narrow beam of light tracing its edges, golden particles floating in the air."
        }
        ThemeStyle::KitchenBright => {
            "Bright morning light rises over the kitchen counter as the camera tilts down onto the {subject}, steam and soft bokeh drifting behind it."
        }
        ThemeStyle::MinimalistPastel => {
            "Geometric pastel props slide into frame around the {subject} in a smooth stop-motion rhythm, shadows shifting with a rotating light."
        }
        ThemeStyle::Industrial => {
            "Cool toned rack focus from concrete texture to the {subject}, a moving shaft of light cutting through faint haze across steel beams."
        }
    }
}

pub fn category_instruction(category: ProductCategory) -> &'static str {
    match category {
        ProductCategory::General => {
            "Render the product with accurate proportions, true-to-life colors and crisp edges."
        }
        ProductCategory::Perfume => {
            "Emphasize glass clarity, liquid color and reflective highlights on the bottle and cap."
        }
        ProductCategory::Food => {
            "Make the food look fresh and appetizing with rich natural colors, visible texture and gentle moisture highlights."
        }
        ProductCategory::Fashion => {
            "Show fabric texture, stitching and drape clearly, keeping material colors faithful."
        }
        ProductCategory::Electronics => {
            "Keep screens, ports and logos sharp, with controlled reflections on glossy and metallic surfaces."
        }
        ProductCategory::Furniture => {
            "Show the furniture at realistic scale with visible wood grain, upholstery texture and grounded contact shadows."
        }
        ProductCategory::Toys => {
            "Use playful, saturated colors while keeping plastic and plush materials clean and detailed."
        }
        ProductCategory::Footwear => {
            "Present the shoe from a flattering three-quarter angle, highlighting sole profile, laces and material finish."
        }
        ProductCategory::Jewelry => {
            "Prioritize sparkle on gemstones and polished metal reflections with macro-level detail."
        }
    }
}

fn fill(template: &str, category: ProductCategory) -> String {
    template.replace("{subject}", category.subject())
}

fn push_custom(prompt: &mut String, custom: Option<&str>) {
    if let Some(extra) = custom.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(" Additional direction: ");
        prompt.push_str(extra);
    }
}

pub fn build_image_prompt(
    theme: Option<ThemeStyle>,
    category: ProductCategory,
    media_type: MediaType,
    custom: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{} {} Ensure the {} remains the main focal point and looks realistic. High resolution.",
        fill(scene_template(theme), category),
        category_instruction(category),
        category.subject()
    );
    if media_type == MediaType::Video {
        prompt.push_str(
            " Compose the frame as the opening shot of a short product video, leaving room for camera movement.",
        );
    }
    push_custom(&mut prompt, custom);
    prompt
}

pub fn build_video_motion_prompt(
    theme: Option<ThemeStyle>,
    category: ProductCategory,
    custom: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Cinematic product video of the provided {}. {} {} Keep the {} as the focal point throughout, professional commercial quality.",
        category.subject(),
        fill(motion_template(theme), category),
        category_instruction(category),
        category.subject()
    );
    push_custom(&mut prompt, custom);
    prompt
}

/// Second stage of the describe-then-generate flow.
pub fn build_described_product_prompt(
    description: &str,
    theme: Option<ThemeStyle>,
    category: ProductCategory,
    custom: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Photorealistic product photography. The product is: {}. {} {} Ensure the product looks exactly as described.",
        description.trim().trim_end_matches('.'),
        fill(scene_template(theme), category),
        category_instruction(category)
    );
    push_custom(&mut prompt, custom);
    prompt
}

/// A fully rendered prompt plus the choices it was built from, so two-stage
/// adapters can re-render it around a product description.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub text: String,
    pub theme: Option<ThemeStyle>,
    pub category: ProductCategory,
    pub custom: Option<String>,
}

impl PromptSpec {
    pub fn image(
        theme: Option<ThemeStyle>,
        category: ProductCategory,
        media_type: MediaType,
        custom: Option<&str>,
    ) -> Self {
        Self {
            text: build_image_prompt(theme, category, media_type, custom),
            theme,
            category,
            custom: custom.map(str::to_string),
        }
    }

    pub fn video(theme: Option<ThemeStyle>, category: ProductCategory, custom: Option<&str>) -> Self {
        Self {
            text: build_video_motion_prompt(theme, category, custom),
            theme,
            category,
            custom: custom.map(str::to_string),
        }
    }

    pub fn with_description(&self, description: &str) -> String {
        build_described_product_prompt(
            description,
            self.theme,
            self.category,
            self.custom.as_deref(),
        )
    }
}

pub fn build_plan_prompt(niche: &str, goal: &str, month: &str) -> String {
    format!(
        r#"Generate a 30-day Instagram content plan for a brand in the "{niche}" niche.
The main goal is "{goal}".
For the month of: {month}.

Return a valid JSON object (not markdown, just raw JSON) with a property "items" which is an array of exactly 30 items, one per day.
Each item must have:
- day (number 1-30, each day used exactly once)
- type (Post, Reel, or Story)
- title (Short catchy title)
- caption (A brief caption idea)
- visualIdea (Description of what the image/video should look like)"#
    )
}
