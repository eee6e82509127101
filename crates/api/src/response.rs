//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Standard success envelope: `{ success: true, message?, ...body }`.
///
/// Errors never go through this type; they are rendered by `AppError`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a 200 response.
    pub const fn ok(body: T) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    /// Create a 201 response.
    pub const fn created(body: T) -> Self {
        Self::with_status(StatusCode::CREATED, body)
    }

    pub const fn with_status(status: StatusCode, body: T) -> Self {
        Self {
            status,
            success: true,
            message: None,
            body,
        }
    }

    /// Attach a human readable message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Body for responses that carry only a message.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Body carrying arbitrary data under `data`.
#[derive(Debug, Serialize)]
pub struct Data<T: Serialize> {
    pub data: T,
}
