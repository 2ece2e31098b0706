// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// User account stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Immutable user ID (also used as document ID)
    pub id: String,
    /// Lowercase, unique
    pub username: String,
    /// Unique
    pub email: String,
    /// Argon2 PHC string
    pub password: String,
    pub fullname: String,
    /// Avatar URL on the media host
    pub avatar: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// The single refresh token currently allowed to be exchanged
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Mark the document as modified now.
    pub fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

/// User as returned to clients: no credential or token fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Access/refresh token pair handed to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Current UTC time as RFC3339 with a `Z` suffix.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
