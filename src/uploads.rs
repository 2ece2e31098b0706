// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multipart form spooling.
//!
//! File parts are written to the upload directory and handed on as
//! [`LocalFile`]s, which delete themselves when dropped. A request that fails
//! half way through parsing therefore leaves nothing behind.

use crate::error::AppError;
use crate::services::LocalFile;
use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::Path;

/// Parsed multipart form with file parts spooled to disk.
#[derive(Debug, Default)]
pub struct SpooledForm {
    fields: HashMap<String, String>,
    files: HashMap<String, LocalFile>,
}

impl SpooledForm {
    /// Read every part of `multipart`. Only `file_fields` may carry files,
    /// at most one each.
    pub async fn read(
        mut multipart: Multipart,
        dir: &Path,
        file_fields: &[&str],
    ) -> Result<Self, AppError> {
        let mut form = SpooledForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if field.file_name().is_none() && !file_fields.contains(&name.as_str()) {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable field {}: {}", name, e)))?;
                form.fields.insert(name, value);
                continue;
            }

            if !file_fields.contains(&name.as_str()) {
                return Err(AppError::Validation(format!("Unexpected file field: {}", name)));
            }
            if form.files.contains_key(&name) {
                return Err(AppError::Validation(format!("Only one file allowed for {}", name)));
            }

            let extension = field.file_name().and_then(safe_extension);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Unreadable file {}: {}", name, e)))?;
            if bytes.is_empty() {
                continue;
            }

            let file = spool(dir, extension.as_deref(), &bytes).await?;
            tracing::debug!(field = %name, size = bytes.len(), "Spooled upload");
            form.files.insert(name, file);
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Owned copy of a text field, empty if absent.
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    pub fn take_file(&mut self, name: &str) -> Option<LocalFile> {
        self.files.remove(name)
    }
}

async fn spool(dir: &Path, extension: Option<&str>, bytes: &[u8]) -> Result<LocalFile, AppError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Failed to create upload directory: {}", e))
    })?;

    let mut file_name = uuid::Uuid::new_v4().to_string();
    if let Some(ext) = extension {
        file_name.push('.');
        file_name.push_str(ext);
    }

    // Owned by the guard before the write so a partial file is also removed.
    let file = LocalFile::new(dir.join(file_name));
    tokio::fs::write(file.path(), bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to spool upload: {}", e)))?;
    Ok(file)
}

/// Keep a short alphanumeric extension from a client-supplied file name.
fn safe_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}
