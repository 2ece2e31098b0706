// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access and refresh token issuance and verification (HS256 JWTs).
//!
//! Access tokens are short-lived and carry a few profile claims. Refresh
//! tokens are long-lived, carry only the subject, and use a separate secret.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{TokenPair, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Unique token ID; two tokens issued in the same second still differ
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
}

/// Token verification failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("jwt expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

struct Keys {
    access_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_secret: Vec<u8>,
    refresh_ttl: Duration,
}

/// Issues and verifies session tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
}

impl TokenService {
    pub fn new(
        access_secret: Vec<u8>,
        access_ttl: Duration,
        refresh_secret: Vec<u8>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            keys: Arc::new(Keys {
                access_secret,
                access_ttl,
                refresh_secret,
                refresh_ttl,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.access_token_secret.clone(),
            config.access_token_ttl,
            config.refresh_token_secret.clone(),
            config.refresh_token_ttl,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.keys.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.keys.refresh_ttl
    }

    /// Sign a short-lived access token for `user`.
    pub fn issue_access_token(&self, user: &User) -> anyhow::Result<String> {
        let mut claims = new_claims(&user.id, self.keys.access_ttl)?;
        claims.username = Some(user.username.clone());
        claims.email = Some(user.email.clone());
        claims.fullname = Some(user.fullname.clone());
        sign(&claims, &self.keys.access_secret)
    }

    /// Sign a long-lived refresh token for `user_id`.
    pub fn issue_refresh_token(&self, user_id: &str) -> anyhow::Result<String> {
        sign(&new_claims(user_id, self.keys.refresh_ttl)?, &self.keys.refresh_secret)
    }

    pub fn issue_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(&user.id)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.keys.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.keys.refresh_secret)
    }
}

fn new_claims(user_id: &str, ttl: Duration) -> anyhow::Result<Claims> {
    let now = Utc::now();
    let expires = now
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow::anyhow!("Token lifetime {} out of range", ttl))?;
    Ok(Claims {
        sub: user_id.to_string(),
        iat: now.timestamp().max(0) as usize,
        exp: expires.timestamp().max(0) as usize,
        jti: uuid::Uuid::new_v4().to_string(),
        username: None,
        email: None,
        fullname: None,
    })
}

fn sign(claims: &Claims, secret: &[u8]) -> anyhow::Result<String> {
    Ok(encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?)
}

/// Check signature and expiry of `token` against `secret`.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::Invalid("invalid signature".to_string()),
            _ => TokenError::Invalid(e.to_string()),
        })
}
