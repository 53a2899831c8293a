//! The JSON envelope every API response is wrapped in.
//!
//! Successful responses look like `{"success": true, "data": ...}` and failed
//! ones like `{"success": false, "error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SuccessBody<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

/// Builds responses in the API's JSON envelope.
pub struct ApiResponse;

impl ApiResponse {
    /// Respond with 200 OK and `data`.
    pub fn ok<T: Serialize>(data: T) -> Response {
        Self::success(StatusCode::OK, data)
    }

    /// Respond with 201 Created and the newly created `data`.
    pub fn created<T: Serialize>(data: T) -> Response {
        Self::success(StatusCode::CREATED, data)
    }

    /// Respond with `status_code` and `data`.
    pub fn success<T: Serialize>(status_code: StatusCode, data: T) -> Response {
        (
            status_code,
            Json(SuccessBody {
                success: true,
                data,
            }),
        )
            .into_response()
    }

    /// Respond with `status_code` and an error `message`.
    pub fn error(status_code: StatusCode, message: &str) -> Response {
        (
            status_code,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}
