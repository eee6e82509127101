//! Report endpoints.

use std::collections::HashMap;

use axum::{
    Router,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use samvad_common::{AppError, AppResult};
use samvad_core::{
    CreateReportInput, FeedbackInput, PhotoUpload, ReportQuery, ReportView, UpdateReportInput,
};
use serde::Serialize;

use crate::{
    extractors::{ApiJson, ApiQuery, AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Empty},
};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const PHOTOS_FIELD: &str = "photos";

#[derive(Serialize)]
pub struct ReportResponse {
    pub report: ReportView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    pub count: usize,
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
    pub reports: Vec<ReportView>,
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {e}"))
}

/// Split a multipart body into text fields and photo files.
async fn read_multipart(
    mut multipart: Multipart,
) -> AppResult<(HashMap<String, String>, Vec<PhotoUpload>)> {
    let mut fields = HashMap::new();
    let mut photos = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == PHOTOS_FIELD {
            let original_name = field.file_name().unwrap_or("photo").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(multipart_error)?.to_vec();
            photos.push(PhotoUpload {
                original_name,
                content_type,
                data,
            });
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            fields.insert(name, text);
        }
    }

    Ok((fields, photos))
}

fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<String>> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(ToString::to_string)
                .map_err(|_| AppError::Validation("Idempotency-Key must be ASCII".to_string()))
        })
        .transpose()
}

/// Submit a report, as JSON or as multipart with photos.
async fn create_report(
    auth: AuthUser,
    State(state): State<AppState>,
    request: Request,
) -> AppResult<ApiResponse<ReportResponse>> {
    let key = idempotency_key(request.headers())?;
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (input, photos) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(multipart_error)?;
        let (fields, photos) = read_multipart(multipart).await?;
        (CreateReportInput::from_form(&fields)?, photos)
    } else {
        let ApiJson(input) = ApiJson::<CreateReportInput>::from_request(request, &state).await?;
        (input, Vec::new())
    };

    let created = state
        .report_service
        .create(&auth.actor(), input, photos, key)
        .await?;

    let status = if created.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok(ApiResponse::with_status(status, ReportResponse {
        report: created.report,
    })
    .message("Report submitted successfully"))
}

/// List reports visible to the caller.
async fn list_reports(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let page = state
        .report_service
        .list(viewer.actor().as_ref(), &query)
        .await?;

    Ok(ApiResponse::ok(ReportListResponse {
        count: page.reports.len(),
        total: page.total,
        pages: page.pages,
        current_page: page.page,
        reports: page.reports,
    }))
}

async fn get_report(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .get(&id, viewer.actor().as_ref())
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }))
}

/// Citizen edit of a still-submitted report.
async fn update_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateReportInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .citizen_update(&auth.actor(), &id, input)
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }).message("Report updated successfully"))
}

async fn delete_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Empty>> {
    state.report_service.delete(&auth.actor(), &id).await?;

    Ok(ApiResponse::ok(Empty {}).message("Report deleted successfully"))
}

async fn submit_feedback(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<FeedbackInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .submit_feedback(&auth.actor(), &id, input)
        .await?;

    Ok(ApiResponse::ok(ReportResponse { report }).message("Feedback submitted successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_report).get(list_reports))
        .route(
            "/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/{id}/feedback", post(submit_feedback))
}
