//! Feature flag exposure for authenticated users.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::auth::CurrentUser;
use crate::dto::FlagSystemInfo;
use crate::error::AppError;
use crate::ServerState;

/// Lists every flag plus a `$system` block describing where flags come from.
///
/// Anonymous callers get an empty 403.
pub async fn list(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    if user.is_none() {
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let mut flags = serde_json::Map::new();
    for (name, enabled) in state.flags.all_flags() {
        flags.insert(name.clone(), serde_json::Value::Bool(*enabled));
    }
    let settings = &state.config.feature_flags;
    let system = FlagSystemInfo {
        feature_flags_default_value: settings.default_value,
        feature_flags_from_file: settings.from_file,
        feature_flags_file: settings.file.display().to_string(),
        version_edition: state.config.version_edition.clone(),
        cloud_instance: None,
    };
    flags.insert("$system".into(), serde_json::to_value(system)?);

    Ok(Html(format!("<pre>{}</pre>", to_indented_json(&flags)?)).into_response())
}

/// Serializes with four-space indentation.
fn to_indented_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| AppError::Internal(e.to_string()))
}
