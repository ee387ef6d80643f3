// src/services/mod.rs
pub mod aspect;
pub mod asset_store;
pub mod generation;
pub mod image_processor;
pub mod normalizer;
pub mod plan_parser;
pub mod poller;
pub mod prompt_builder;
pub mod providers;
pub mod retry;

pub use asset_store::{AssetStore, BlobStore, PlanStore};
pub use generation::GenerationService;
pub use image_processor::ImageProcessor;
pub use providers::{AdapterSource, ProviderRegistry};
pub use retry::RetryPolicy;
