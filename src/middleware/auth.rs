// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token authentication middleware.

use crate::error::AppError;
use crate::models::PublicUser;
use crate::routes::cookies::ACCESS_TOKEN_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated user attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: PublicUser,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Middleware that requires a valid access token.
///
/// The handler only runs once the token is verified and its user loaded.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request)
        .ok_or_else(|| AppError::Unauthorized("Access denied, token not provided".to_string()))?;

    let claims = state.tokens.verify_access(&token)?;

    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::debug!(user_id = %user.id, "Request authenticated");

    request.extensions_mut().insert(AuthUser { user: user.into() });

    Ok(next.run(request).await)
}

/// Cookie first, then `Authorization: Bearer`.
fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
