// src/services/plan_parser.rs
use crate::errors::GenerationError;
use crate::models::{ContentPlanItem, Provider};
use serde_json::Value;
use std::collections::HashSet;

pub const PLAN_DAYS: u32 = 30;

/// Removes markdown code fences (```json ... ```) a model may wrap JSON in.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) up to the first newline.
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn extract_embedded_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json(raw: &str) -> Option<Value> {
    let stripped = strip_code_fences(raw);
    serde_json::from_str(stripped).ok().or_else(|| {
        extract_embedded_json(stripped).and_then(|inner| serde_json::from_str(inner).ok())
    })
}

pub fn parse_plan(raw: &str, provider: Provider) -> Result<Vec<ContentPlanItem>, GenerationError> {
    let malformed = |detail: String| GenerationError::MalformedResponse { provider, detail };

    let value = parse_json(raw)
        .ok_or_else(|| malformed("content plan response did not contain valid JSON".to_string()))?;

    let items = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove("items")
            .ok_or_else(|| malformed("content plan JSON has no \"items\" array".to_string()))?,
        _ => return Err(malformed("content plan JSON was not an object or array".to_string())),
    };

    let items: Vec<ContentPlanItem> = serde_json::from_value(items)
        .map_err(|e| malformed(format!("content plan items were not well formed: {}", e)))?;

    validate_plan(items).map_err(malformed)
}

fn validate_plan(mut items: Vec<ContentPlanItem>) -> Result<Vec<ContentPlanItem>, String> {
    if items.len() != PLAN_DAYS as usize {
        return Err(format!(
            "expected {} plan items, got {}",
            PLAN_DAYS,
            items.len()
        ));
    }

    let mut seen = HashSet::new();
    for item in &items {
        if !(1..=PLAN_DAYS).contains(&item.day) {
            return Err(format!("day {} is outside 1-{}", item.day, PLAN_DAYS));
        }
        if !seen.insert(item.day) {
            return Err(format!("day {} appears more than once", item.day));
        }
        if item.title.trim().is_empty()
            || item.caption.trim().is_empty()
            || item.visual_idea.trim().is_empty()
        {
            return Err(format!("day {} is missing a title, caption or visual idea", item.day));
        }
    }

    items.sort_by_key(|item| item.day);
    Ok(items)
}
