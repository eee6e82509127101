//! API endpoints.

mod admin;
mod auth;
mod health;
mod reports;
mod staff;

use axum::Router;

use crate::middleware::AppState;

pub use health::health;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/reports", reports::router())
        .nest("/staff", staff::router())
        .nest("/admin", admin::router())
}
