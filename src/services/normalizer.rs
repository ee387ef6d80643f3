// src/services/normalizer.rs
use crate::errors::GenerationError;
use crate::models::{AssetPayload, Provider};
use crate::services::asset_store::BlobStore;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAsset {
    pub url: String,
    pub mime_type: String,
    pub blob_id: Option<Uuid>,
}

/// Turns any adapter success shape into a URL usable for display and download.
pub async fn normalize(
    payload: AssetPayload,
    provider: Provider,
    blobs: &BlobStore,
) -> Result<NormalizedAsset, GenerationError> {
    let malformed = |detail: &str| GenerationError::MalformedResponse {
        provider,
        detail: detail.to_string(),
    };

    match payload {
        AssetPayload::Inline {
            data_base64,
            mime_type,
        } => {
            let data = data_base64.trim();
            if data.is_empty() {
                return Err(malformed("inline payload was empty"));
            }
            Ok(NormalizedAsset {
                url: format!("data:{};base64,{}", mime_type, data),
                mime_type,
                blob_id: None,
            })
        }
        AssetPayload::Remote { url, mime_type } => {
            if url.trim().is_empty() {
                return Err(malformed("response URL was empty"));
            }
            Ok(NormalizedAsset {
                url,
                mime_type,
                blob_id: None,
            })
        }
        AssetPayload::Binary { bytes, mime_type } => {
            if bytes.is_empty() {
                return Err(malformed("downloaded file was empty"));
            }
            let id = blobs.register(bytes, mime_type.clone()).await;
            Ok(NormalizedAsset {
                url: BlobStore::url_for(&id),
                mime_type,
                blob_id: Some(id),
            })
        }
    }
}
