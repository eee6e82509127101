//! Authentication and profile endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use samvad_common::AppResult;
use samvad_core::{ChangePasswordInput, LoginInput, RegisterInput, UpdateProfileInput};
use samvad_db::entities::user;
use serde::Serialize;

use crate::{
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// A user, with the bearer token when one was just issued.
#[derive(Serialize)]
pub struct UserResponse {
    pub user: user::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    fn with_token(user: user::Model) -> Self {
        let token = user.token.clone();
        Self { user, token }
    }

    const fn without_token(user: user::Model) -> Self {
        Self { user, token: None }
    }
}

/// Register a citizen account.
async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.register(input).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok(ApiResponse::created(UserResponse::with_token(user)).message("User registered successfully"))
}

/// Log in with email and password.
async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.login(input).await?;

    Ok(ApiResponse::ok(UserResponse::with_token(user)).message("Login successful"))
}

/// Current user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(UserResponse::without_token(user))
}

async fn update_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<UpdateProfileInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.update_profile(&user.id, input).await?;

    Ok(ApiResponse::ok(UserResponse::without_token(user)).message("Profile updated successfully"))
}

/// Change password; the response carries the new token.
async fn change_password(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ChangePasswordInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.change_password(&user.id, input).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(ApiResponse::ok(UserResponse::with_token(user)).message("Password changed successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/change-password", put(change_password))
}
