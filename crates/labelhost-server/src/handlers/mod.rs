//! HTTP route handlers for the labelhost server.

pub mod feature_flags;
pub mod local_files;
pub mod main_page;
pub mod version;

use axum::Json;
use tracing::debug;

use crate::dto::HealthResponse;

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    debug!("Got /health request.");
    Json(HealthResponse { status: "UP" })
}
