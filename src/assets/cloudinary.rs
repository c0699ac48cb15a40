use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use super::{AssetError, AssetHost};
use crate::config::AssetsConfig;
use crate::db::models::Asset;

/// Client for a Cloudinary-style image API.
///
/// Requests are signed with SHA-256, so the cloud account must be configured
/// for SHA-256 API signatures.
pub struct CloudinaryClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryClient {
    pub fn new(config: &AssetsConfig) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!(
            "{}/{}/image/",
            config.api_base.trim_end_matches('/'),
            config.cloud_name
        ))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> Result<Url, AssetError> {
        self.base
            .join(action)
            .map_err(|e| AssetError::Rejected(format!("bad endpoint: {}", e)))
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }
}

/// Signature over the request parameters: `k=v` pairs sorted by key, joined
/// with `&`, followed by the API secret, SHA-256 hex encoded.
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AssetHost for CloudinaryClient {
    async fn upload(&self, path: &Path) -> Result<Asset, AssetError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Self::timestamp();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .http
            .post(self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AssetError::Rejected(format!("upload {}: {}", status, body)));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!("Uploaded asset {}", uploaded.public_id);

        Ok(Asset {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), AssetError> {
        let timestamp = Self::timestamp();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let params = [
            ("public_id", public_id),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint("destroy")?)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AssetError::Rejected(format!("destroy {}: {}", status, body)));
        }

        // "not found" means it is already gone
        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(AssetError::Rejected(format!("destroy result: {}", other))),
        }
    }
}
