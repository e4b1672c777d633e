//! Landing page redirect.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::auth::CurrentUser;

pub const LOGIN_PATH: &str = "/user/login/";
pub const PROJECTS_PATH: &str = "/projects/";

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Sends users with an active organization to their projects, everyone else to login.
pub async fn index(CurrentUser(user): CurrentUser) -> Response {
    match user {
        Some(user) if user.active_organization.is_some() => found(PROJECTS_PATH),
        _ => found(LOGIN_PATH),
    }
}
