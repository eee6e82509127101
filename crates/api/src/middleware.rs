//! API middleware and shared state.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use samvad_common::{Config, StorageBackend};
use samvad_core::{PhotoService, ReportService, StaffService, UserService};
use samvad_db::repositories::{ReportCommentRepository, ReportRepository, UserRepository};
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub report_service: ReportService,
    pub staff_service: StaffService,
}

impl AppState {
    /// Wire repositories and services over one database connection.
    #[must_use]
    pub fn new(
        db: &Arc<DatabaseConnection>,
        config: &Config,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(db));
        let report_repo = ReportRepository::new(Arc::clone(db));
        let comment_repo = ReportCommentRepository::new(Arc::clone(db));

        let photo_service = PhotoService::new(storage, config.uploads.clone());
        let user_service = UserService::new(user_repo.clone());
        let report_service = ReportService::new(
            report_repo.clone(),
            comment_repo.clone(),
            user_repo.clone(),
            photo_service,
        );
        let staff_service = StaffService::new(
            report_service.clone(),
            report_repo,
            comment_repo,
            user_repo,
            config.lifecycle.clone(),
        );

        Self {
            user_service,
            report_service,
            staff_service,
        }
    }
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` to a user and stores it in the
/// request extensions. Requests without a valid token pass through
/// anonymously; handlers that need a user reject them.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) if e.is_server_error() => {
                tracing::error!(error = %e, "Token lookup failed");
            }
            Err(_) => {}
        }
    }

    next.run(req).await
}
