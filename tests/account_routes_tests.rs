// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration and profile update routes.

use account_api::services::MediaService;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

mod common;

const PNG: &[u8] = b"\x89PNG fake image bytes";

async fn post_register(
    app: &Router,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> axum::response::Response {
    let (content_type, body) = common::multipart_body(fields, files);
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/register")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

fn full_fields<'a>(username: &'a str, email: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("fullname", "Frank Example"),
        ("username", username),
        ("email", email),
        ("password", "secret1"),
    ]
}

async fn bearer_for(state: &account_api::AppState, user_id: &str) -> String {
    let user = state.db.get_user(user_id).await.unwrap().unwrap();
    format!("Bearer {}", state.tokens.issue_access_token(&user).unwrap())
}

async fn patch_json(app: &Router, auth: &str, uri: &str, json: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(uri)
                .header(header::AUTHORIZATION, auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn patch_multipart(
    app: &Router,
    auth: &str,
    uri: &str,
    files: &[(&str, &str, &[u8])],
) -> axum::response::Response {
    let (content_type, body) = common::multipart_body(&[("note", "profile")], files);
    app.clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(uri)
                .header(header::AUTHORIZATION, auth)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ─── Registration ────────────────────────────────────────────

#[tokio::test]
async fn test_register_with_cover_image() {
    let (app, _) = common::create_test_app();

    let response = post_register(
        &app,
        &full_fields("Frank", "frank@x.com"),
        &[("avatar", "a.png", PNG), ("coverImage", "c.jpg", PNG)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["data"]["username"], "frank");
    assert!(body["data"]["avatar"].as_str().unwrap().contains("avatars"));
    assert!(body["data"]["coverImage"]
        .as_str()
        .unwrap()
        .contains("cover-images"));
}

#[tokio::test]
async fn test_register_requires_avatar() {
    let (app, _) = common::create_test_app();

    let response = post_register(&app, &full_fields("grace", "grace@x.com"), &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Avatar is required");
}

#[tokio::test]
async fn test_register_blank_field() {
    let (app, _) = common::create_test_app();

    let response = post_register(
        &app,
        &[
            ("fullname", "   "),
            ("username", "heidi"),
            ("email", "heidi@x.com"),
            ("password", "secret1"),
        ],
        &[("avatar", "a.png", PNG)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "All fields are required");
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let (app, state) = common::create_test_app();
    common::seed_user(&state, "ivan", "ivan@x.com", "secret1").await;

    let response = post_register(
        &app,
        &full_fields("IVAN", "other@x.com"),
        &[("avatar", "a.png", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_register(
        &app,
        &full_fields("someone", "ivan@x.com"),
        &[("avatar", "a.png", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_avatar_upload_failure() {
    let (app, state) = common::create_test_app_with_media(MediaService::new_failing_mock());

    let response = post_register(
        &app,
        &full_fields("judy", "judy@x.com"),
        &[("avatar", "a.png", PNG)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Failed to upload avatar");
    assert!(state.db.find_by_username("judy").await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_rejects_non_multipart() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username":"x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ─── Account details ─────────────────────────────────────────

#[tokio::test]
async fn test_update_account_details() {
    let (app, state) = common::create_test_app();
    let user = common::seed_user(&state, "leo", "leo@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_json(
        &app,
        &auth,
        "/api/v1/users/update-account",
        r#"{"fullname":"Leo Renamed","username":"Leo2","email":"leo2@x.com"}"#,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["data"]["fullname"], "Leo Renamed");
    assert_eq!(body["data"]["username"], "leo2");
    assert_eq!(body["data"]["email"], "leo2@x.com");

    let stored = state.db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.username, "leo2");
}

#[tokio::test]
async fn test_update_account_keeping_own_username() {
    let (app, state) = common::create_test_app();
    let user = common::seed_user(&state, "mia", "mia@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_json(
        &app,
        &auth,
        "/api/v1/users/update-account",
        r#"{"fullname":"Mia New","username":"mia","email":"mia@x.com"}"#,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_account_conflict_and_validation() {
    let (app, state) = common::create_test_app();
    common::seed_user(&state, "nick", "nick@x.com", "secret1").await;
    let user = common::seed_user(&state, "olga", "olga@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_json(
        &app,
        &auth,
        "/api/v1/users/update-account",
        r#"{"fullname":"Olga","username":"nick","email":"olga@x.com"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = patch_json(
        &app,
        &auth,
        "/api/v1/users/update-account",
        r#"{"fullname":"Olga","username":"olga"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = patch_json(&app, &auth, "/api/v1/users/update-account", "not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ─── Images ──────────────────────────────────────────────────

#[tokio::test]
async fn test_update_avatar_and_cover_image() {
    let (app, state) = common::create_test_app();
    let user = common::seed_user(&state, "pat", "pat@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_multipart(
        &app,
        &auth,
        "/api/v1/users/avatar",
        &[("avatar", "new.png", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Avatar updated successfully");
    assert_ne!(body["data"]["avatar"], user.avatar.as_str());

    let response = patch_multipart(
        &app,
        &auth,
        "/api/v1/users/cover-image",
        &[("coverImage", "cover.jpg", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert!(body["data"]["coverImage"]
        .as_str()
        .unwrap()
        .contains("cover-images"));

    let stored = state.db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.cover_image.is_some());
}

#[tokio::test]
async fn test_update_image_requires_file() {
    let (app, state) = common::create_test_app();
    let user = common::seed_user(&state, "quinn", "quinn@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_multipart(&app, &auth, "/api/v1/users/avatar", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Avatar is required");

    let response = patch_multipart(&app, &auth, "/api/v1/users/cover-image", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Cover image is required");
}

#[tokio::test]
async fn test_update_image_upload_failure_keeps_old_avatar() {
    let (app, state) = common::create_test_app_with_media(MediaService::new_failing_mock());
    // Registration needs a working media host; copy the record across.
    let (_, seeded_state) = common::create_test_app();
    let user = common::seed_user(&seeded_state, "ruth", "ruth@x.com", "secret1").await;
    let stored = seeded_state.db.get_user(&user.id).await.unwrap().unwrap();
    state.db.create_user(&stored).await.unwrap();
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_multipart(
        &app,
        &auth,
        "/api/v1/users/avatar",
        &[("avatar", "new.png", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Failed to upload avatar");

    let after = state.db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(after.avatar, stored.avatar);
}

#[tokio::test]
async fn test_update_image_rejects_unexpected_file_field() {
    let (app, state) = common::create_test_app();
    let user = common::seed_user(&state, "sam", "sam@x.com", "secret1").await;
    let auth = bearer_for(&state, &user.id).await;

    let response = patch_multipart(
        &app,
        &auth,
        "/api/v1/users/avatar",
        &[("coverImage", "c.png", PNG)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
