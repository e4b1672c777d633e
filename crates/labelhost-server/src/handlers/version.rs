//! Platform version endpoints.

use std::sync::Arc;

use axum::{extract::State, response::Html, Json};

use crate::auth::CurrentUser;
use crate::dto::VersionInfo;
use crate::error::AppError;
use crate::services::version::{collect_versions, visible_settings};
use crate::ServerState;

/// Returns version info as JSON.
pub async fn json(State(state): State<Arc<ServerState>>) -> Json<VersionInfo> {
    Json(collect_versions(&state.config))
}

/// Renders version info as preformatted HTML. Superusers also see settings.
pub async fn page(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let mut info = collect_versions(&state.config);
    if user.is_some_and(|u| u.is_superuser) {
        info.settings = Some(visible_settings(&state.config));
    }
    let body = serde_json::to_string_pretty(&info)?;
    Ok(Html(format!("<pre>{}</pre>", body)))
}
