// src/services/providers/openai.rs
use crate::config::ProviderSettings;
use crate::errors::GenerationError;
use crate::models::{AspectRatio, AssetPayload, ContentPlanItem, MediaType, Provider, SourceImage};
use crate::services::aspect;
use crate::services::image_processor::fit_to_frame;
use crate::services::plan_parser::parse_plan;
use crate::services::poller::{OperationState, PollPolicy, poll_operation};
use crate::services::prompt_builder::{PromptSpec, VISION_ANALYSIS_INSTRUCTION, build_plan_prompt};
use crate::services::providers::http::{
    classify_status, ensure_success, malformed, read_json, transport_error,
};
use crate::services::providers::{ImageGenerator, PlanGenerator, VideoGenerator};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{info, warn};
use reqwest::{Client, RequestBuilder, StatusCode, multipart};
use serde_json::{Value, json};

const PROVIDER: Provider = Provider::OpenAI;
const VISION_MAX_TOKENS: u32 = 300;

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    settings: ProviderSettings,
    poll: PollPolicy,
}

type VideoOutcome = Result<String, GenerationError>;

/// Chat models cannot paint; they describe the product for the image model instead.
pub fn uses_vision_analysis(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    model.starts_with("gpt") && !model.starts_with("gpt-image")
}

pub fn data_uri(source: &SourceImage) -> String {
    format!(
        "data:{};base64,{}",
        source.mime_type,
        general_purpose::STANDARD.encode(&source.data)
    )
}

/// Extracts the assistant text from a chat completion, surfacing refusals and filter stops.
pub(crate) fn chat_content(provider: Provider, result: &Value) -> Result<String, GenerationError> {
    let choice = &result["choices"][0];
    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(GenerationError::ContentBlocked {
            provider,
            reason: "the response was stopped by the content filter".to_string(),
        });
    }
    if let Some(refusal) = choice["message"]["refusal"].as_str() {
        return Err(GenerationError::ContentBlocked {
            provider,
            reason: refusal.to_string(),
        });
    }
    choice["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(provider, "no content in chat completion"))
}

/// Reads the first entry of an images/generations style `data` array.
pub(crate) fn generation_payload(
    provider: Provider,
    result: &Value,
    default_mime: &str,
) -> Result<AssetPayload, GenerationError> {
    let first = result["data"]
        .get(0)
        .ok_or_else(|| malformed(provider, "response contained no generated items"))?;

    if let Some(data) = first["b64_json"].as_str().filter(|d| !d.is_empty()) {
        return Ok(AssetPayload::Inline {
            data_base64: data.to_string(),
            mime_type: default_mime.to_string(),
        });
    }
    if let Some(url) = first["url"].as_str().filter(|u| !u.is_empty()) {
        return Ok(AssetPayload::Remote {
            url: url.to_string(),
            mime_type: default_mime.to_string(),
        });
    }
    Err(malformed(provider, "generated item had neither b64_json nor url"))
}

fn job_state(job: &Value, model: &str) -> Result<OperationState<VideoOutcome>, GenerationError> {
    let id = job["id"]
        .as_str()
        .ok_or_else(|| malformed(PROVIDER, "video job has no id"))?;
    Ok(match job["status"].as_str().unwrap_or("queued") {
        "completed" => OperationState::Done(Ok(id.to_string())),
        "failed" => {
            let error = &job["error"];
            let message = error["message"]
                .as_str()
                .or_else(|| error["code"].as_str())
                .unwrap_or("video generation failed");
            OperationState::Done(Err(classify_status(
                PROVIDER,
                model,
                "generate videos",
                StatusCode::BAD_REQUEST,
                &json!({ "error": { "message": message, "code": error["code"] } }).to_string(),
            )))
        }
        _ => OperationState::Pending,
    })
}

impl OpenAIAdapter {
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

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn send_json(
        &self,
        builder: RequestBuilder,
        model: &str,
        capability: &'static str,
    ) -> Result<Value, GenerationError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, capability, response).await?;
        read_json(PROVIDER, response).await
    }

    async fn analyze_product(&self, source: &SourceImage, model: &str) -> Result<String, GenerationError> {
        info!("Analyzing product image with {}", model);
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": VISION_ANALYSIS_INSTRUCTION },
                    { "type": "image_url", "image_url": { "url": data_uri(source) } }
                ]
            }],
            "max_tokens": VISION_MAX_TOKENS
        });

        let result = self
            .send_json(
                self.client.post(self.url("chat/completions")).json(&body),
                model,
                "analyze images",
            )
            .await?;
        let description = chat_content(PROVIDER, &result)?;
        if description.trim().is_empty() {
            return Err(malformed(PROVIDER, "vision model returned an empty description"));
        }
        Ok(description)
    }

    async fn create_image(&self, prompt: &str, size: &str, model: &str) -> Result<AssetPayload, GenerationError> {
        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "size": size
        });
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("dall-e") {
            body["response_format"] = json!("b64_json");
        }
        if lower == "dall-e-3" {
            body["quality"] = json!("hd");
        }

        let result = self
            .send_json(
                self.client.post(self.url("images/generations")).json(&body),
                model,
                "generate images",
            )
            .await?;
        generation_payload(PROVIDER, &result, "image/png")
    }

    async fn query_job(&self, id: &str, model: &str) -> Result<OperationState<VideoOutcome>, GenerationError> {
        let job = self
            .send_json(
                self.client.get(self.url(&format!("videos/{}", id))),
                model,
                "generate videos",
            )
            .await?;
        job_state(&job, model)
    }

    async fn download_video(&self, id: &str, model: &str) -> Result<AssetPayload, GenerationError> {
        let response = self
            .request(self.client.get(self.url(&format!("videos/{}/content", id))))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, model, "generate videos", response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        Ok(AssetPayload::Binary {
            bytes,
            mime_type: "video/mp4".to_string(),
        })
    }

    // A completed job is never resubmitted; transient content fetch failures
    // are retried here against the same job id within the poll budget.
    async fn fetch_finished(&self, id: &str, model: &str) -> Result<AssetPayload, GenerationError> {
        match self.download_video(id, model).await {
            Err(error) if error.is_retryable() => {
                warn!("OpenAI video download failed, retrying: {}", error);
                poll_operation(&self.poll, PROVIDER, OperationState::Pending, move || async move {
                    self.download_video(id, model).await.map(OperationState::Done)
                })
                .await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAIAdapter {
    async fn generate_image(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        if uses_vision_analysis(model) {
            let image_model = self.settings.image_model.clone();
            let size = aspect::image_size_for_model(PROVIDER, ratio, &image_model)?;
            let description = self
                .analyze_product(source, model)
                .await
                .map_err(|e| GenerationError::AnalysisFailed(Box::new(e)))?;
            info!("Generating image from product description with {}", image_model);
            return self
                .create_image(&prompt.with_description(&description), size, &image_model)
                .await;
        }

        let size = aspect::image_size_for_model(PROVIDER, ratio, model)?;
        info!("OpenAI image generation with {} ({})", model, size);
        self.create_image(&prompt.text, size, model).await
    }

    fn default_image_model(&self) -> &str {
        &self.settings.image_model
    }
}

#[async_trait]
impl VideoGenerator for OpenAIAdapter {
    async fn generate_video(
        &self,
        source: &SourceImage,
        prompt: &PromptSpec,
        ratio: AspectRatio,
        model: &str,
    ) -> Result<AssetPayload, GenerationError> {
        let size = aspect::require(PROVIDER, MediaType::Video, ratio)?;
        let (width, height) = aspect::pixel_size(size)
            .ok_or_else(|| GenerationError::Validation(format!("Invalid video size {}", size)))?;
        let frame = fit_to_frame(source, width, height)?;
        info!("Submitting OpenAI video job with {} ({})", model, size);

        let reference = multipart::Part::bytes(frame.data.to_vec())
            .file_name("product")
            .mime_str(&frame.mime_type)
            .map_err(|e| {
                GenerationError::ImageProcessing(format!(
                    "Unsupported image type {}: {}",
                    frame.mime_type, e
                ))
            })?;
        let form = multipart::Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.text.clone())
            .text("size", size.to_string())
            .part("input_reference", reference);

        let job = self
            .send_json(
                self.client.post(self.url("videos")).multipart(form),
                model,
                "generate videos",
            )
            .await?;
        let id = job["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed(PROVIDER, "video submission returned no job id"))?
            .to_string();

        let finished = poll_operation(&self.poll, PROVIDER, job_state(&job, model)?, || {
            self.query_job(&id, model)
        })
        .await??;

        info!("OpenAI video job {} completed, downloading", finished);
        self.fetch_finished(&finished, model).await
    }

    fn default_video_model(&self) -> &str {
        &self.settings.video_model
    }
}

#[async_trait]
impl PlanGenerator for OpenAIAdapter {
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
                { "role": "system", "content": "You are a helpful social media strategist that outputs JSON." },
                { "role": "user", "content": build_plan_prompt(niche, goal, month) }
            ],
            "response_format": { "type": "json_object" }
        });

        let result = self
            .send_json(
                self.client.post(self.url("chat/completions")).json(&body),
                model,
                "generate content plans",
            )
            .await?;
        parse_plan(&chat_content(PROVIDER, &result)?, PROVIDER)
    }

    fn default_plan_model(&self) -> &str {
        &self.settings.plan_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductCategory, ThemeStyle};
    use crate::services::image_processor::tiny_png;
    use crate::services::retry::{RetryPolicy, with_retry};
    use image::GenericImageView;
    use bytes::Bytes;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn adapter(base_url: String) -> OpenAIAdapter {
        OpenAIAdapter::new(
            Client::new(),
            "sk-test".to_string(),
            ProviderSettings {
                api_key: Some("sk-test".to_string()),
                base_url,
                image_model: "dall-e-3".to_string(),
                video_model: "sora-2".to_string(),
                plan_model: "gpt-4o".to_string(),
            },
            PollPolicy::new(Duration::from_millis(1), Duration::from_millis(50)),
        )
    }

    fn source() -> SourceImage {
        SourceImage {
            data: Bytes::from_static(b"jpeg-bytes"),
            mime_type: "image/jpeg".to_string(),
        }
    }

    fn product_photo() -> SourceImage {
        SourceImage {
            data: Bytes::from(tiny_png(30, 40)),
            mime_type: "image/png".to_string(),
        }
    }

    fn prompt() -> PromptSpec {
        PromptSpec::image(
            Some(ThemeStyle::LuxuryDark),
            ProductCategory::Perfume,
            MediaType::Image,
            None,
        )
    }

    #[test]
    fn vision_flow_is_chosen_by_model_prefix() {
        assert!(uses_vision_analysis("gpt-4o"));
        assert!(uses_vision_analysis("GPT-5-pro"));
        assert!(!uses_vision_analysis("gpt-image-1"));
        assert!(!uses_vision_analysis("dall-e-3"));
        assert!(!uses_vision_analysis("my-custom-model"));
    }

    #[tokio::test]
    async fn two_stage_flow_describes_then_generates() {
        let mut server = Server::new_async().await;
        let vision = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "model": "gpt-4o", "max_tokens": 300 })),
                Matcher::Regex("Do NOT describe the background".to_string()),
                Matcher::Regex("data:image/jpeg;base64,".to_string()),
            ]))
            .with_status(200)
            .with_body(
                json!({ "choices": [{ "message": { "content": "A frosted glass bottle with a gold cap." } }] })
                    .to_string(),
            )
            .create_async()
            .await;
        let images = server
            .mock("POST", "/images/generations")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "model": "dall-e-3",
                    "size": "1024x1024",
                    "response_format": "b64_json"
                })),
                Matcher::Regex("The product is: A frosted glass bottle with a gold cap".to_string()),
            ]))
            .with_status(200)
            .with_body(json!({ "data": [{ "b64_json": "UE5H" }] }).to_string())
            .create_async()
            .await;

        let payload = adapter(server.url())
            .generate_image(&source(), &prompt(), AspectRatio::Square, "gpt-4o")
            .await
            .unwrap();

        vision.assert_async().await;
        images.assert_async().await;
        assert_eq!(
            payload,
            AssetPayload::Inline {
                data_base64: "UE5H".to_string(),
                mime_type: "image/png".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_analysis_short_circuits() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [{ "message": { "content": "" } }] }).to_string())
            .create_async()
            .await;
        let images = server
            .mock("POST", "/images/generations")
            .expect(0)
            .create_async()
            .await;

        let err = adapter(server.url())
            .generate_image(&source(), &prompt(), AspectRatio::Square, "gpt-4o")
            .await
            .unwrap_err();

        images.assert_async().await;
        assert!(matches!(err, GenerationError::AnalysisFailed(_)));
        assert!(err.to_string().contains("analysis failed"));
    }

    #[tokio::test]
    async fn direct_model_uses_rendered_prompt_and_url() {
        let mut server = Server::new_async().await;
        let images = server
            .mock("POST", "/images/generations")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-image-1",
                "prompt": prompt().text,
                "size": "1536x1024"
            })))
            .with_status(200)
            .with_body(json!({ "data": [{ "url": "https://files.example/img.png" }] }).to_string())
            .create_async()
            .await;

        let payload = adapter(server.url())
            .generate_image(&source(), &prompt(), AspectRatio::Wide, "gpt-image-1")
            .await
            .unwrap();

        images.assert_async().await;
        assert!(matches!(payload, AssetPayload::Remote { ref url, .. } if url == "https://files.example/img.png"));
    }

    #[tokio::test]
    async fn safety_rejection_is_content_blocked() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(400)
            .with_body(r#"{"error":{"code":"content_policy_violation","message":"rejected by safety system"}}"#)
            .create_async()
            .await;

        let err = adapter(server.url())
            .generate_image(&source(), &prompt(), AspectRatio::Square, "dall-e-3")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ContentBlocked { .. }));
    }

    #[tokio::test]
    async fn video_job_is_polled_and_downloaded() {
        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/videos")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Regex("name=\"input_reference\"".to_string()))
            .with_status(200)
            .with_body(r#"{"id":"video_1","status":"queued"}"#)
            .create_async()
            .await;
        let in_progress = server
            .mock("GET", "/videos/video_1")
            .with_status(200)
            .with_body(r#"{"id":"video_1","status":"in_progress","progress":40}"#)
            .expect(1)
            .create_async()
            .await;
        let completed = server
            .mock("GET", "/videos/video_1")
            .with_status(200)
            .with_body(r#"{"id":"video_1","status":"completed"}"#)
            .create_async()
            .await;
        let content = server
            .mock("GET", "/videos/video_1/content")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body("mp4")
            .create_async()
            .await;

        let spec = PromptSpec::video(Some(ThemeStyle::CleanStudio), ProductCategory::Electronics, None);
        let payload = adapter(server.url())
            .generate_video(&product_photo(), &spec, AspectRatio::Wide, "sora-2")
            .await
            .unwrap();

        submit.assert_async().await;
        in_progress.assert_async().await;
        completed.assert_async().await;
        content.assert_async().await;
        assert!(matches!(payload, AssetPayload::Binary { ref mime_type, .. } if mime_type == "video/mp4"));
    }

    #[tokio::test]
    async fn reference_frame_is_sized_to_the_video() {
        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/videos")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"size\"\r\n\r\n720x1280".to_string()),
                Matcher::Regex("Content-Type: image/png".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"video_3","status":"completed"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/videos/video_3/content")
            .with_status(200)
            .with_body("mp4")
            .create_async()
            .await;

        let source = product_photo();
        let (width, height) = aspect::pixel_size("720x1280").unwrap();
        let frame = fit_to_frame(&source, width, height).unwrap();
        assert_eq!(
            image::load_from_memory(&frame.data).unwrap().dimensions(),
            (720, 1280)
        );

        let spec = PromptSpec::video(None, ProductCategory::General, None);
        adapter(server.url())
            .generate_video(&source, &spec, AspectRatio::Vertical, "sora-2")
            .await
            .unwrap();
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn flaky_download_does_not_resubmit_the_job() {
        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/videos")
            .with_status(200)
            .with_body(r#"{"id":"video_4","status":"completed"}"#)
            .expect(1)
            .create_async()
            .await;
        let unavailable = server
            .mock("GET", "/videos/video_4/content")
            .with_status(503)
            .with_body("upstream busy")
            .expect(1)
            .create_async()
            .await;
        let content = server
            .mock("GET", "/videos/video_4/content")
            .with_status(200)
            .with_body("mp4")
            .create_async()
            .await;

        let adapter = adapter(server.url());
        let spec = PromptSpec::video(None, ProductCategory::General, None);
        let source = product_photo();
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let payload = with_retry(&policy, "video", || {
            adapter.generate_video(&source, &spec, AspectRatio::Wide, "sora-2")
        })
        .await
        .unwrap();

        submit.assert_async().await;
        unavailable.assert_async().await;
        content.assert_async().await;
        assert!(matches!(payload, AssetPayload::Binary { .. }));
    }

    #[test]
    fn failed_job_with_moderation_is_blocked() {
        let job = json!({
            "id": "video_2",
            "status": "failed",
            "error": { "code": "moderation_blocked", "message": "Blocked by moderation" }
        });
        assert!(matches!(
            job_state(&job, "sora-2").unwrap(),
            OperationState::Done(Err(GenerationError::ContentBlocked { .. }))
        ));
    }

    #[tokio::test]
    async fn plan_reads_chat_json() {
        let items: Vec<Value> = (1..=30)
            .map(|day| json!({ "day": day, "type": "Post", "title": "T", "caption": "C", "visualIdea": "V" }))
            .collect();
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "response_format": { "type": "json_object" } })))
            .with_status(200)
            .with_body(
                json!({ "choices": [{ "message": { "content": json!({ "items": items }).to_string() } }] })
                    .to_string(),
            )
            .create_async()
            .await;

        let plan = adapter(server.url())
            .generate_plan("pottery", "awareness", "June", "gpt-4o")
            .await
            .unwrap();
        assert_eq!(plan.len(), 30);
        assert_eq!(plan[29].day, 30);
    }
}
