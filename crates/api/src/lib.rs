//! HTTP API layer for samvad.
//!
//! - **Endpoints**: auth, reports, staff workflow and admin routes
//! - **Extractors**: authentication and envelope-aware JSON/query parsing
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
