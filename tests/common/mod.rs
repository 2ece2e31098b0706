// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use account_api::config::Config;
use account_api::db::FirestoreDb;
use account_api::models::PublicUser;
use account_api::routes::create_router;
use account_api::services::{LocalFile, MediaService, NewAccount};
use account_api::AppState;
use axum::http::header;
use axum::response::Response;
use std::sync::Arc;

pub const BOUNDARY: &str = "----account-api-test-boundary";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test app backed by the in-memory store and mock media host.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_media(MediaService::new_mock())
}

#[allow(dead_code)]
pub fn create_test_app_with_media(media: MediaService) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        FirestoreDb::new_in_memory(),
        media,
    ));
    (create_router(state.clone()), state)
}

/// Write a throwaway file that stands in for an upload.
#[allow(dead_code)]
pub fn temp_upload(contents: &[u8]) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("account-api-it-uploads");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(uuid::Uuid::new_v4().to_string());
    std::fs::write(&path, contents).unwrap();
    path
}

/// Register a user directly through the service layer.
#[allow(dead_code)]
pub async fn seed_user(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> PublicUser {
    state
        .accounts
        .register(NewAccount {
            fullname: format!("{} Example", username),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            avatar: Some(LocalFile::new(temp_upload(b"avatar"))),
            cover_image: None,
        })
        .await
        .expect("seed user")
}

/// Build a multipart/form-data body. Returns (content type, body).
#[allow(dead_code)]
pub fn multipart_body(
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, contents) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Value part of a `Set-Cookie` header (`name=value; ...`).
#[allow(dead_code)]
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}
