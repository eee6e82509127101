//! Admin endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{post, put},
};
use samvad_common::AppResult;
use samvad_core::CreateStaffInput;
use samvad_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Serialize)]
pub struct UserResponse {
    pub user: user::Model,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Create a staff account.
async fn create_staff(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateStaffInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .create_staff(&auth.actor(), input)
        .await?;

    Ok(ApiResponse::created(UserResponse { user }).message("Staff account created successfully"))
}

/// Activate or deactivate an account.
async fn set_active(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .set_active(&auth.actor(), &id, req.is_active)
        .await?;

    let message = if user.is_active {
        "Account activated"
    } else {
        "Account deactivated"
    };
    Ok(ApiResponse::ok(UserResponse { user }).message(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staff", post(create_staff))
        .route("/users/{id}/active", put(set_active))
}
