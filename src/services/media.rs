// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Media host uploads for avatar and cover images.
//!
//! Handles:
//! - Signed uploads to the media host (Cloudinary upload API)
//! - Removal of the local temporary file on every path, including when the
//!   request future is dropped mid-upload
//! - Degrading upload failures to `None` so callers pick the status code

use crate::config::MediaHostConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Where an uploaded image ends up on a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Avatar,
    CoverImage,
}

impl MediaSlot {
    /// Multipart field name carrying this slot's file.
    pub fn field_name(self) -> &'static str {
        match self {
            MediaSlot::Avatar => "avatar",
            MediaSlot::CoverImage => "coverImage",
        }
    }

    fn folder(self) -> &'static str {
        match self {
            MediaSlot::Avatar => "avatars",
            MediaSlot::CoverImage => "cover-images",
        }
    }
}

/// A file on local disk that is removed when this value is dropped.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed local upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove local upload")
            }
        }
    }
}

/// Durable location of an uploaded asset.
#[derive(Debug, Clone)]
pub struct RemoteAsset {
    pub url: String,
    pub public_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum MediaError {
    #[error("reading local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("media host returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("media host response had no URL")]
    MissingUrl,

    #[error("mock upload failure")]
    MockFailure,
}

/// Media upload service.
#[derive(Clone)]
pub struct MediaService {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Cloudinary(CloudinaryClient),
    Mock { fail: bool },
}

impl MediaService {
    pub fn new(config: &MediaHostConfig) -> Self {
        Self {
            backend: Backend::Cloudinary(CloudinaryClient {
                http: reqwest::Client::new(),
                config: config.clone(),
            }),
        }
    }

    /// Mock service whose uploads succeed with a synthetic URL.
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Mock { fail: false },
        }
    }

    /// Mock service whose uploads always fail.
    pub fn new_failing_mock() -> Self {
        Self {
            backend: Backend::Mock { fail: true },
        }
    }

    /// Upload `file` for `slot` and remove it locally afterwards.
    ///
    /// Returns `None` if the upload failed for any reason.
    pub async fn attach(&self, file: LocalFile, slot: MediaSlot) -> Option<RemoteAsset> {
        let result = match &self.backend {
            Backend::Cloudinary(client) => client.upload(file.path(), slot.folder()).await,
            Backend::Mock { fail } => mock_upload(file.path(), slot.folder(), *fail).await,
        };
        drop(file);

        match result {
            Ok(asset) => {
                tracing::info!(slot = ?slot, url = %asset.url, "Media uploaded");
                Some(asset)
            }
            Err(e) => {
                tracing::warn!(slot = ?slot, error = %e, "Media upload failed");
                None
            }
        }
    }
}

async fn mock_upload(path: &Path, folder: &str, fail: bool) -> Result<RemoteAsset, MediaError> {
    tokio::fs::metadata(path).await?;
    if fail {
        return Err(MediaError::MockFailure);
    }
    let public_id = format!("{}/{}", folder, uuid::Uuid::new_v4());
    Ok(RemoteAsset {
        url: format!("https://media.invalid/{}", public_id),
        public_id: Some(public_id),
    })
}

#[derive(Clone)]
struct CloudinaryClient {
    http: reqwest::Client,
    config: MediaHostConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: Option<String>,
}

impl CloudinaryClient {
    async fn upload(&self, path: &Path, folder: &str) -> Result<RemoteAsset, MediaError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_upload(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!(
            "{}/v1_1/{}/auto/upload",
            self.config.api_base, self.config.cloud_name
        );

        let response = self.http.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected { status, body });
        }

        let body: UploadResponse = response.json().await?;
        let url = body.secure_url.or(body.url).ok_or(MediaError::MissingUrl)?;

        Ok(RemoteAsset {
            url,
            public_id: body.public_id,
        })
    }
}

/// Signature over the signed upload parameters: sorted `k=v` pairs joined by
/// `&`, followed by the API secret, SHA-256, hex.
fn sign_upload(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut params = params.to_vec();
    params.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
