//! Staff workflow endpoints.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post, put},
};
use samvad_common::{AppError, AppResult};
use samvad_core::{
    Analytics, AnalyticsQuery, AssignInput, CommentInput, Dashboard, ReportView, StatusInput,
};
use serde::Serialize;

use crate::{
    extractors::{ApiJson, ApiQuery, AuthUser},
    middleware::AppState,
    response::{ApiResponse, Data},
};

#[derive(Serialize)]
pub struct ReportResponse {
    pub report: ReportView,
}

async fn assign_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<ApiResponse<ReportResponse>> {
    // An empty body means self-assignment.
    let input: AssignInput = if body.iter().all(u8::is_ascii_whitespace) {
        AssignInput::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            if e.is_syntax() || e.is_eof() {
                AppError::BadRequest(e.to_string())
            } else {
                AppError::Validation(e.to_string())
            }
        })?
    };
    let report = state
        .staff_service
        .assign(&auth.actor(), &id, input)
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }).message("Report assigned successfully"))
}

async fn update_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<StatusInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .staff_service
        .set_status(&auth.actor(), &id, input)
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }).message("Report status updated successfully"))
}

async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<CommentInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .staff_service
        .add_comment(&auth.actor(), &id, input)
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }).message("Comment added successfully"))
}

async fn dashboard(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Data<Dashboard>>> {
    let data = state.staff_service.dashboard(&auth.actor()).await?;

    Ok(ApiResponse::ok(Data { data }))
}

async fn analytics(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> AppResult<ApiResponse<Data<Analytics>>> {
    let data = state.staff_service.analytics(&auth.actor(), &query).await?;

    Ok(ApiResponse::ok(Data { data }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/{id}/assign", put(assign_report))
        .route("/reports/{id}/status", put(update_status))
        .route("/reports/{id}/comment", post(add_comment))
        .route("/dashboard", get(dashboard))
        .route("/analytics", get(analytics))
}
