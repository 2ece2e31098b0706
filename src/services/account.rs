// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration and profile updates.

use crate::db::{fields, FirestoreDb};
use crate::error::AppError;
use crate::models::user::now_rfc3339;
use crate::models::{PublicUser, User};
use crate::services::media::{LocalFile, MediaService, MediaSlot};
use crate::services::password::hash_password;

/// Registration input. Text fields are validated here, not by the caller.
#[derive(Debug)]
pub struct NewAccount {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<LocalFile>,
    pub cover_image: Option<LocalFile>,
}

/// Account operations that touch the media host.
#[derive(Clone)]
pub struct AccountService {
    db: FirestoreDb,
    media: MediaService,
}

impl AccountService {
    pub fn new(db: FirestoreDb, media: MediaService) -> Self {
        Self { db, media }
    }

    /// Create a user. The avatar is mandatory; the cover image is best-effort.
    pub async fn register(&self, account: NewAccount) -> Result<PublicUser, AppError> {
        let NewAccount {
            fullname,
            username,
            email,
            password,
            avatar,
            cover_image,
        } = account;

        let fullname = fullname.trim();
        let username = username.trim().to_lowercase();
        let email = email.trim();
        if [fullname, username.as_str(), email, password.trim()]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        // Dropping the uploads on any early return removes them from disk.
        self.db.ensure_unique(&username, email, None).await?;

        let avatar = avatar.ok_or_else(|| AppError::Validation("Avatar is required".to_string()))?;
        let avatar = self
            .media
            .attach(avatar, MediaSlot::Avatar)
            .await
            .ok_or_else(|| AppError::Validation("Failed to upload avatar".to_string()))?;

        let cover_image = match cover_image {
            Some(file) => self.media.attach(file, MediaSlot::CoverImage).await,
            None => None,
        };

        let now = now_rfc3339();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email: email.to_string(),
            password: hash_password(&password).await?,
            fullname: fullname.to_string(),
            avatar: avatar.url,
            cover_image: cover_image.map(|asset| asset.url),
            refresh_token: None,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.create_user(&user).await?;

        let created = self.db.get_user(&user.id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Failed to create user {}", user.id))
        })?;

        tracing::info!(user_id = %created.id, username = %created.username, "User registered");
        Ok(created.into())
    }

    /// Replace fullname, username and email.
    pub async fn update_account_details(
        &self,
        user_id: &str,
        fullname: &str,
        username: &str,
        email: &str,
    ) -> Result<PublicUser, AppError> {
        let fullname = fullname.trim().to_string();
        let username = username.trim().to_lowercase();
        let email = email.trim().to_string();
        if fullname.is_empty() || username.is_empty() || email.is_empty() {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        self.db.ensure_unique(&username, &email, Some(user_id)).await?;

        let user = self
            .db
            .patch_user(
                user_id,
                &[fields::FULLNAME, fields::USERNAME, fields::EMAIL, fields::UPDATED_AT],
                move |user| {
                    user.fullname = fullname;
                    user.username = username;
                    user.email = email;
                    user.touch();
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id, "Account details updated");
        Ok(user.into())
    }

    /// Upload a new avatar or cover image and point the user at it.
    pub async fn update_image(
        &self,
        user_id: &str,
        slot: MediaSlot,
        file: Option<LocalFile>,
    ) -> Result<PublicUser, AppError> {
        let label = match slot {
            MediaSlot::Avatar => "Avatar",
            MediaSlot::CoverImage => "Cover image",
        };

        let file = file.ok_or_else(|| AppError::Validation(format!("{} is required", label)))?;
        let asset = self
            .media
            .attach(file, slot)
            .await
            .ok_or_else(|| {
                AppError::Validation(format!("Failed to upload {}", label.to_lowercase()))
            })?;

        let field = match slot {
            MediaSlot::Avatar => fields::AVATAR,
            MediaSlot::CoverImage => fields::COVER_IMAGE,
        };

        let user = self
            .db
            .patch_user(user_id, &[field, fields::UPDATED_AT], move |user| {
                match slot {
                    MediaSlot::Avatar => user.avatar = asset.url,
                    MediaSlot::CoverImage => user.cover_image = Some(asset.url),
                }
                user.touch();
            })
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id, slot = ?slot, "Profile image updated");
        Ok(user.into())
    }
}
