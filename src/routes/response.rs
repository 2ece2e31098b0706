// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Success envelope shared by all user routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{statusCode, data, message, success}` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
