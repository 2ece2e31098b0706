// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PublicUser, TokenPair};
use crate::routes::cookies::{
    clear_session_cookies, cookie_value, set_session_cookies, REFRESH_TOKEN_COOKIE,
};
use crate::routes::response::ApiResponse;
use crate::services::{MediaSlot, NewAccount};
use crate::uploads::SpooledForm;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users/refresh-token", post(refresh_token))
}

/// Routes behind `require_auth` (applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/logout", post(logout))
        .route("/api/v1/users/change-password", post(change_password))
        .route("/api/v1/users/current-user", get(current_user))
        .route("/api/v1/users/update-account", patch(update_account))
        .route("/api/v1/users/avatar", patch(update_avatar))
        .route("/api/v1/users/cover-image", patch(update_cover_image))
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::Validation(e.body_text()))
}

fn multipart_body(body: std::result::Result<Multipart, MultipartRejection>) -> Result<Multipart> {
    body.map_err(|e| AppError::Validation(e.body_text()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ─── Registration ────────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let mut form = SpooledForm::read(
        multipart_body(multipart)?,
        &state.config.upload_dir,
        &[
            MediaSlot::Avatar.field_name(),
            MediaSlot::CoverImage.field_name(),
        ],
    )
    .await?;

    let account = NewAccount {
        fullname: form.text_or_empty("fullname"),
        username: form.text_or_empty("username"),
        email: form.text_or_empty("email"),
        password: form.text_or_empty("password"),
        avatar: form.take_file(MediaSlot::Avatar.field_name()),
        cover_image: form.take_file(MediaSlot::CoverImage.field_name()),
    };

    let user = state.accounts.register(account).await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>)> {
    let req = json_body(body)?;
    let username = non_empty(req.username);
    let email = non_empty(req.email);

    if username.is_none() && email.is_none() {
        return Err(AppError::Validation(
            "Username or email is required".to_string(),
        ));
    }
    let password = non_empty(req.password)
        .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

    let outcome = state
        .sessions
        .login(username.as_deref(), email.as_deref(), &password)
        .await?;

    let jar = set_session_cookies(jar, &outcome.tokens, &state.tokens);

    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user: outcome.user,
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>)> {
    state.sessions.logout(auth.id()).await?;

    Ok((
        clear_session_cookies(jar),
        ApiResponse::ok(serde_json::json!({}), "User logged out successfully"),
    ))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Accepts the refresh token from the cookie, else from a JSON body.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<TokenPair>)> {
    let presented = cookie_value(&jar, REFRESH_TOKEN_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshRequest>(&body)
            .unwrap_or_default()
            .refresh_token
    });

    let pair = state.sessions.refresh(presented.as_deref()).await?;
    let jar = set_session_cookies(jar, &pair, &state.tokens);

    Ok((
        jar,
        ApiResponse::ok(pair, "Access token refreshed successfully"),
    ))
}

// ─── Account ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    password: Option<String>,
    new_password: Option<String>,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>> {
    let req = json_body(body)?;
    let (Some(current), Some(new)) = (non_empty(req.password), non_empty(req.new_password)) else {
        return Err(AppError::Validation(
            "Current and new password are required".to_string(),
        ));
    };

    state
        .sessions
        .change_password(auth.id(), &current, &new)
        .await?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

async fn current_user(Extension(auth): Extension<AuthUser>) -> ApiResponse<PublicUser> {
    ApiResponse::ok(auth.user, "Current user fetched successfully")
}

#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    fullname: Option<String>,
    username: Option<String>,
    email: Option<String>,
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: std::result::Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let req = json_body(body)?;
    let (Some(fullname), Some(username), Some(email)) = (
        non_empty(req.fullname),
        non_empty(req.username),
        non_empty(req.email),
    ) else {
        return Err(AppError::Validation("All fields are required".to_string()));
    };

    let user = state
        .accounts
        .update_account_details(auth.id(), &fullname, &username, &email)
        .await?;

    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let user = update_image(&state, &auth, MediaSlot::Avatar, multipart).await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully"))
}

async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>> {
    let user = update_image(&state, &auth, MediaSlot::CoverImage, multipart).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

async fn update_image(
    state: &AppState,
    auth: &AuthUser,
    slot: MediaSlot,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<PublicUser> {
    let mut form = SpooledForm::read(
        multipart_body(multipart)?,
        &state.config.upload_dir,
        &[slot.field_name()],
    )
    .await?;

    state
        .accounts
        .update_image(auth.id(), slot, form.take_file(slot.field_name()))
        .await
}
