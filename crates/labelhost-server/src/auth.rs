//! Request authentication via `Authorization: Token <key>` headers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use labelhost_core::User;
use tracing::warn;

use crate::ServerState;

/// The user making the request, or `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

/// Extracts the token from an `Authorization` header value.
fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("token") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<Arc<ServerState>> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(token_from_header)
        else {
            return Ok(CurrentUser(None));
        };

        match state.auth.user_for_token(token) {
            Ok(user) => Ok(CurrentUser(user)),
            Err(e) => {
                warn!("Token lookup failed, treating request as anonymous: {}", e);
                Ok(CurrentUser(None))
            }
        }
    }
}
