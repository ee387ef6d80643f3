// src/handlers.rs
use crate::services::aspect;
use crate::{AppState, errors::GenerationError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// JSON body for shot and video requests; the image is a data URI or bare base64.
#[derive(Debug, Deserialize)]
pub struct GenerationForm {
    pub image: String,
    #[serde(default)]
    pub theme: Option<ThemeStyle>,
    #[serde(default)]
    pub category: ProductCategory,
    #[serde(alias = "aspectRatio")]
    pub aspect_ratio: AspectRatio,
    pub provider: Provider,
    #[serde(default, alias = "modelId")]
    pub model: Option<String>,
    #[serde(default, alias = "customPrompt")]
    pub custom_prompt: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_UPLOAD_BYTES * 2)
            .error_handler(|err, _req| GenerationError::Validation(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .route("/options", web::get().to(options))
            .route("/shots", web::post().to(create_shot))
            .route("/shots/upload", web::post().to(upload_shot))
            .route("/videos", web::post().to(create_video))
            .route("/videos/upload", web::post().to(upload_video))
            .route("/plans", web::post().to(create_plan))
            .route("/plans/current", web::get().to(current_plan))
            .route("/assets", web::get().to(list_assets))
            .route("/assets", web::delete().to(clear_assets))
            .route("/assets/{asset_id}", web::delete().to(delete_asset))
            .route("/blobs/{blob_id}", web::get().to(get_blob)),
    )
    .route("/health", web::get().to(health_check));
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "marketplace-magic",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn options(data: web::Data<AppState>) -> HttpResponse {
    let themes: Vec<Value> = ThemeStyle::ALL
        .iter()
        .map(|t| json!({ "id": t, "label": t.label() }))
        .collect();
    let categories: Vec<Value> = ProductCategory::ALL
        .iter()
        .map(|c| json!({ "id": c, "label": c.label() }))
        .collect();
    let providers: Vec<Value> = Provider::ALL
        .iter()
        .map(|&provider| {
            let settings = data.config.provider(provider);
            json!({
                "id": provider,
                "name": provider.to_string(),
                "configured": data.generation.adapters().is_configured(provider),
                "key_env_var": provider.key_env_var(),
                "default_models": {
                    "image": settings.image_model,
                    "video": settings.video_model,
                    "plan": settings.plan_model
                },
                "supported_ratios": {
                    "image": aspect::supported_ratios(provider, MediaType::Image),
                    "video": aspect::supported_ratios(provider, MediaType::Video)
                }
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "themes": themes,
        "categories": categories,
        "aspect_ratios": AspectRatio::ALL,
        "providers": providers
    }))
}

fn request_from_form(
    data: &AppState,
    form: GenerationForm,
    media_type: MediaType,
) -> Result<GenerationRequest, GenerationError> {
    let source_image = data.image_processor.from_data_uri(&form.image)?;
    Ok(GenerationRequest {
        source_image,
        theme: form.theme,
        category: form.category,
        aspect_ratio: form.aspect_ratio,
        media_type,
        provider: form.provider,
        model_id: form.model,
        custom_prompt: form.custom_prompt,
    })
}

fn parse_choice<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T, GenerationError> {
    serde_json::from_value(Value::String(raw.trim().to_string()))
        .map_err(|_| GenerationError::Validation(format!("Unknown {} '{}'", field, raw.trim())))
}

/// Reads an `image` file part plus plain text fields into a generation request.
async fn request_from_multipart(
    data: &AppState,
    mut payload: Multipart,
    media_type: MediaType,
) -> Result<GenerationRequest, Error> {
    let mut image: Option<(Vec<u8>, Option<String>)> = None;
    let mut fields: HashMap<String, String> = HashMap::new();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let is_file = field.content_disposition().get_filename().is_some();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(GenerationError::Validation(format!(
                    "Upload exceeds {} MB",
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                ))
                .into());
            }
            bytes.extend_from_slice(&chunk);
        }

        if name == "image" || (is_file && image.is_none()) {
            image = Some((bytes, content_type));
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| GenerationError::Validation(format!("Field {} is not UTF-8 text", name)))?;
            fields.insert(name, value);
        }
    }

    let (bytes, declared_mime) =
        image.ok_or_else(|| GenerationError::Validation("No product image was provided".to_string()))?;
    let source_image = data.image_processor.prepare(bytes, declared_mime.as_deref())?;

    let text = |key: &str| {
        fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };
    let required = |key: &'static str| {
        text(key).ok_or_else(|| GenerationError::Validation(format!("Missing field {}", key)))
    };

    let theme = text("theme").map(|t| parse_choice("theme", t)).transpose()?;
    let category = text("category")
        .map(|c| parse_choice("category", c))
        .transpose()?
        .unwrap_or_default();

    Ok(GenerationRequest {
        source_image,
        theme,
        category,
        aspect_ratio: parse_choice("aspect ratio", required("aspect_ratio")?)?,
        media_type,
        provider: parse_choice("provider", required("provider")?)?,
        model_id: text("model").map(str::to_string),
        custom_prompt: text("custom_prompt").map(str::to_string),
    })
}

pub async fn create_shot(
    data: web::Data<AppState>,
    body: web::Json<GenerationForm>,
) -> Result<HttpResponse, Error> {
    let request = request_from_form(&data, body.into_inner(), MediaType::Image)?;
    let asset = data.generation.generate_shot(request).await?;
    Ok(HttpResponse::Ok().json(&asset))
}

pub async fn upload_shot(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = request_from_multipart(&data, payload, MediaType::Image).await?;
    let asset = data.generation.generate_shot(request).await?;
    Ok(HttpResponse::Ok().json(&asset))
}

pub async fn create_video(
    data: web::Data<AppState>,
    body: web::Json<GenerationForm>,
) -> Result<HttpResponse, Error> {
    let request = request_from_form(&data, body.into_inner(), MediaType::Video)?;
    let asset = data.generation.generate_video_ad(request).await?;
    Ok(HttpResponse::Ok().json(&asset))
}

pub async fn upload_video(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = request_from_multipart(&data, payload, MediaType::Video).await?;
    let asset = data.generation.generate_video_ad(request).await?;
    Ok(HttpResponse::Ok().json(&asset))
}

pub async fn create_plan(
    data: web::Data<AppState>,
    body: web::Json<PlanRequest>,
) -> Result<HttpResponse, Error> {
    let plan = data.generation.generate_content_plan(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan.as_ref()))
}

fn not_found(message: String) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "Not found",
        "kind": "not_found",
        "message": message
    }))
}

pub async fn current_plan(data: web::Data<AppState>) -> HttpResponse {
    match data.generation.plans().current().await {
        Some(plan) => HttpResponse::Ok().json(plan.as_ref()),
        None => not_found("No content plan has been generated yet".to_string()),
    }
}

pub async fn list_assets(data: web::Data<AppState>) -> HttpResponse {
    let assets = data.generation.list_assets().await;
    HttpResponse::Ok().json(assets.as_ref())
}

pub async fn clear_assets(data: web::Data<AppState>) -> HttpResponse {
    let cleared = data.generation.clear_assets().await;
    HttpResponse::Ok().json(json!({ "cleared": cleared }))
}

pub async fn delete_asset(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let asset_id = path.into_inner();
    match data.generation.remove_asset(&asset_id).await {
        Some(asset) => HttpResponse::Ok().json(&asset),
        None => not_found(format!("Asset {} not found", asset_id)),
    }
}

pub async fn get_blob(path: web::Path<Uuid>, data: web::Data<AppState>) -> HttpResponse {
    let blob_id = path.into_inner();
    match data.blobs.get(&blob_id).await {
        Some(blob) => HttpResponse::Ok()
            .content_type(blob.mime_type)
            .body(blob.bytes),
        None => not_found(format!("Blob {} not found", blob_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::generation::tests::{EchoAdapter, service_with};
    use crate::services::image_processor::tiny_png;
    use crate::services::{BlobStore, ImageProcessor};
    use actix_web::{App, http::StatusCode, test};
    use base64::{Engine as _, engine::general_purpose};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn state(adapter: Arc<EchoAdapter>, configured: Vec<Provider>) -> AppState {
        let generation = service_with(adapter, configured);
        AppState {
            blobs: generation.blobs().clone(),
            generation: Arc::new(generation),
            image_processor: Arc::new(ImageProcessor::new(2048)),
            config: Arc::new(Config::from_lookup(|_| None).unwrap()),
        }
    }

    fn png_data_uri() -> String {
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(tiny_png(4, 4))
        )
    }

    #[actix_web::test]
    async fn shot_returns_asset_and_fills_gallery() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter.clone(), vec![Provider::Gemini])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/shots")
            .set_json(json!({
                "image": png_data_uri(),
                "theme": "CLEAN_STUDIO",
                "category": "FOOD",
                "aspect_ratio": "1:1",
                "provider": "gemini"
            }))
            .to_request();
        let asset: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(asset["provider"], "gemini");
        assert_eq!(asset["media_type"], "image");
        assert_eq!(asset["theme"], "CLEAN_STUDIO");

        let req = test::TestRequest::get().uri("/api/v1/assets").to_request();
        let gallery: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0]["id"], asset["id"]);
    }

    #[actix_web::test]
    async fn missing_key_surfaces_as_json_error() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter.clone(), vec![])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/shots")
            .set_json(json!({
                "image": png_data_uri(),
                "aspect_ratio": "1:1",
                "provider": "openai"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "missing_credential");
        assert!(body["message"].as_str().unwrap().contains("OPENAI_API_KEY"));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter, vec![Provider::Gemini])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/videos")
            .set_json(json!({ "image": png_data_uri(), "aspect_ratio": "2:1", "provider": "gemini" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "validation");
    }

    #[actix_web::test]
    async fn multipart_video_is_served_from_blob_store() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter.clone(), vec![Provider::Gemini])))
                .configure(configure),
        )
        .await;

        let boundary = "mm-boundary";
        let mut body = Vec::new();
        for (name, value) in [
            ("theme", "INDUSTRIAL"),
            ("category", "ELECTRONICS"),
            ("aspect_ratio", "16:9"),
            ("provider", "gemini"),
        ] {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"p.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&tiny_png(4, 4));
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = test::TestRequest::post()
            .uri("/api/v1/videos/upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(body)
            .to_request();
        let asset: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(asset["media_type"], "video");
        assert!(adapter.prompts.lock().unwrap()[0].contains("electronic device"));

        let url = asset["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/api/v1/blobs/"));
        let req = test::TestRequest::get().uri(&url).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp4");

        let req = test::TestRequest::delete().uri("/api/v1/assets").to_request();
        let cleared: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(cleared["cleared"], 1);
        let req = test::TestRequest::get().uri(&url).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn plan_round_trip_and_current_snapshot() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter, vec![Provider::OpenRouter])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/plans/current").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/v1/plans")
            .set_json(json!({ "niche": "tea", "goal": "launch", "month": "May", "provider": "openrouter" }))
            .to_request();
        let plan: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(plan["items"].as_array().unwrap().len(), 30);
        assert_eq!(plan["items"][0]["visualIdea"], "idea");

        let req = test::TestRequest::get().uri("/api/v1/plans/current").to_request();
        let current: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(current["niche"], "tea");
    }

    #[actix_web::test]
    async fn options_advertise_capabilities() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter, vec![Provider::Gemini])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/options").to_request();
        let options: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(options["themes"].as_array().unwrap().len(), 7);
        assert_eq!(options["categories"].as_array().unwrap().len(), 9);

        let gemini = &options["providers"][0];
        assert_eq!(gemini["id"], "gemini");
        assert_eq!(gemini["configured"], true);
        assert_eq!(gemini["supported_ratios"]["video"], json!(["16:9", "9:16"]));
        assert_eq!(options["providers"][1]["configured"], false);
    }

    #[actix_web::test]
    async fn unknown_asset_and_blob_are_not_found() {
        let adapter = Arc::new(EchoAdapter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(adapter, vec![])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::delete().uri("/api/v1/assets/nope").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&BlobStore::url_for(&Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
