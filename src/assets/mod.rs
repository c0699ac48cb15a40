pub mod cloudinary;
pub mod staging;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::Asset;

pub use cloudinary::CloudinaryClient;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset host rejected request: {0}")]
    Rejected(String),
}

/// External image host. Assets are addressed by the opaque id the host returns.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Uploads the file at `path` and returns its id and public URL.
    async fn upload(&self, path: &Path) -> Result<Asset, AssetError>;

    async fn delete(&self, public_id: &str) -> Result<(), AssetError>;
}

/// Pushes a staged file to the host. The staged copy is removed afterwards,
/// whether or not the upload succeeded.
pub async fn upload_staged(host: &dyn AssetHost, path: &Path) -> Result<Asset, AssetError> {
    let result = host.upload(path).await;

    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove staged file {}: {}", path.display(), e);
    }

    result
}

/// Best-effort removal of an asset nothing will reference, after a later step failed.
pub async fn discard(host: &dyn AssetHost, asset: &Asset) {
    if let Err(e) = host.delete(&asset.public_id).await {
        tracing::warn!("Failed to discard unused asset {}: {}", asset.public_id, e);
    }
}
