// src/services/asset_store.rs
use crate::models::{ContentPlan, GeneratedAsset};
use bytes::Bytes;
use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const BLOB_ROUTE: &str = "/api/v1/blobs";

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Session-scoped binaries fetched from providers, addressable by local URL.
#[derive(Default)]
pub struct BlobStore {
    blobs: RwLock<HashMap<Uuid, Blob>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, bytes: Bytes, mime_type: String) -> Uuid {
        let id = Uuid::new_v4();
        self.blobs
            .write()
            .await
            .insert(id, Blob { bytes, mime_type });
        id
    }

    pub fn url_for(id: &Uuid) -> String {
        format!("{}/{}", BLOB_ROUTE, id)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Blob> {
        self.blobs.read().await.get(id).cloned()
    }

    pub async fn revoke(&self, id: &Uuid) -> bool {
        self.blobs.write().await.remove(id).is_some()
    }

    pub async fn revoke_all(&self) -> usize {
        let mut blobs = self.blobs.write().await;
        let count = blobs.len();
        blobs.clear();
        count
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

/// In-memory gallery, newest first. Every mutation swaps in a new list.
pub struct AssetStore {
    assets: RwLock<Arc<Vec<GeneratedAsset>>>,
    blobs: Arc<BlobStore>,
    counter: AtomicU64,
}

impl AssetStore {
    pub fn new(blobs: Arc<BlobStore>) -> Self {
        Self {
            assets: RwLock::new(Arc::new(Vec::new())),
            blobs,
            counter: AtomicU64::new(0),
        }
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", Utc::now().timestamp_millis(), n)
    }

    pub async fn list(&self) -> Arc<Vec<GeneratedAsset>> {
        self.assets.read().await.clone()
    }

    pub async fn prepend(&self, asset: GeneratedAsset) {
        let mut guard = self.assets.write().await;
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(asset);
        next.extend(guard.iter().cloned());
        *guard = Arc::new(next);
    }

    pub async fn remove(&self, id: &str) -> Option<GeneratedAsset> {
        let removed = {
            let mut guard = self.assets.write().await;
            let removed = guard.iter().find(|a| a.id == id).cloned()?;
            let next: Vec<_> = guard.iter().filter(|a| a.id != id).cloned().collect();
            *guard = Arc::new(next);
            removed
        };
        if let Some(blob_id) = removed.blob_id {
            self.blobs.revoke(&blob_id).await;
        }
        Some(removed)
    }

    pub async fn clear(&self) -> usize {
        let previous = {
            let mut guard = self.assets.write().await;
            std::mem::replace(&mut *guard, Arc::new(Vec::new()))
        };
        for blob_id in previous.iter().filter_map(|a| a.blob_id) {
            self.blobs.revoke(&blob_id).await;
        }
        info!("Cleared {} assets from the gallery", previous.len());
        previous.len()
    }
}

/// Latest content plan; a new plan replaces the old one wholesale.
#[derive(Default)]
pub struct PlanStore {
    current: RwLock<Option<Arc<ContentPlan>>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, plan: ContentPlan) -> Arc<ContentPlan> {
        let plan = Arc::new(plan);
        *self.current.write().await = Some(plan.clone());
        plan
    }

    pub async fn current(&self) -> Option<Arc<ContentPlan>> {
        self.current.read().await.clone()
    }
}
