// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::Config;
use crate::services::{
    AssetStore, BlobStore, GenerationService, ImageProcessor, PlanStore, ProviderRegistry,
    RetryPolicy,
};

#[derive(Clone)]
pub struct AppState {
    generation: Arc<GenerationService>,
    image_processor: Arc<ImageProcessor>,
    blobs: Arc<BlobStore>,
    config: Arc<Config>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Marketplace Magic service...");

    let config = Arc::new(Config::from_env()?);
    for provider in models::Provider::ALL {
        if config.provider(provider).api_key.is_none() {
            info!("{} is not configured ({} unset)", provider, provider.key_env_var());
        }
    }

    // Initialize services
    let registry = ProviderRegistry::new(config.clone()).context("failed to build HTTP client")?;
    let blobs = Arc::new(BlobStore::new());
    let generation = Arc::new(GenerationService::new(
        Arc::new(registry),
        RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay),
        Arc::new(AssetStore::new(blobs.clone())),
        Arc::new(PlanStore::new()),
    ));
    let image_processor = Arc::new(ImageProcessor::new(config.max_image_dimension));

    let app_state = AppState {
        generation,
        image_processor,
        blobs: blobs.clone(),
        config: config.clone(),
    };

    let bind_addr = config.bind_addr.clone();
    let frontend_dir = config.frontend_dir.clone();
    if let Some(dir) = &frontend_dir {
        info!("Serving frontend from {}", dir.display());
    }

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure);
        if let Some(dir) = &frontend_dir {
            app = app.service(actix_files::Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await?;

    let revoked = blobs.revoke_all().await;
    info!("Shutdown complete, released {} stored blobs", revoked);
    Ok(())
}
