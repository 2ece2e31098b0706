// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: login, logout, refresh-token rotation, password change.
//!
//! Each user has exactly one refresh-token slot. Login and every successful
//! refresh overwrite it, so a refresh token can be exchanged at most once and
//! any previously issued token stops working. Logout empties the slot.

use crate::db::{fields, FirestoreDb, RefreshSwap};
use crate::error::AppError;
use crate::models::{PublicUser, TokenPair, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::TokenService;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Orchestrates session operations against the user store.
#[derive(Clone)]
pub struct SessionManager {
    db: FirestoreDb,
    tokens: TokenService,
}

impl SessionManager {
    pub fn new(db: FirestoreDb, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// Authenticate with a username and/or email plus password.
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<LoginOutcome, AppError> {
        let username = username.map(|u| u.trim().to_lowercase());
        let email = email.map(str::trim);

        let user = self
            .db
            .find_by_username_or_email(username.as_deref(), email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(password, &user.password).await? {
            tracing::info!(user_id = %user.id, "Login rejected: bad password");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let tokens = self.rotate(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            user: user.into(),
            tokens,
        })
    }

    /// Forget the user's refresh token. Idempotent.
    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        let existed = self.db.set_refresh_token(user_id, None).await?;
        tracing::info!(user_id, existed, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair, invalidating the one presented.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, AppError> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify_refresh(presented)?;

        let user = self
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid refresh token".to_string()))?;

        let tokens = self.issue(&user)?;

        // Only one of several concurrent refreshes with the same token wins.
        match self
            .db
            .compare_and_set_refresh_token(&user.id, presented, &tokens.refresh_token)
            .await?
        {
            RefreshSwap::Swapped => {
                tracing::info!(user_id = %user.id, "Refresh token rotated");
                Ok(tokens)
            }
            RefreshSwap::Mismatch => {
                tracing::warn!(user_id = %user.id, "Refresh token reuse or stale token rejected");
                Err(AppError::Unauthorized(
                    "Refresh token is expired or used".to_string(),
                ))
            }
            RefreshSwap::UserMissing => {
                Err(AppError::NotFound("Invalid refresh token".to_string()))
            }
        }
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(current_password, &user.password).await? {
            return Err(AppError::Unauthorized("Password is incorrect".to_string()));
        }

        let new_hash = hash_password(new_password).await?;
        self.db
            .patch_user(user_id, &[fields::PASSWORD, fields::UPDATED_AT], move |user| {
                user.password = new_hash;
                user.touch();
            })
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        self.tokens.issue_pair(user).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to generate tokens: {}", e))
        })
    }

    /// Issue a fresh pair and make its refresh token the only valid one.
    async fn rotate(&self, user: &User) -> Result<TokenPair, AppError> {
        let tokens = self.issue(user)?;

        let stored = self
            .db
            .set_refresh_token(&user.id, Some(&tokens.refresh_token))
            .await?;
        if !stored {
            return Err(AppError::Internal(anyhow::anyhow!(
                "User vanished while storing refresh token"
            )));
        }
        Ok(tokens)
    }
}
