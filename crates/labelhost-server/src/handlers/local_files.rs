//! Serves files from local storage connections.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    response::Response,
};

use crate::auth::CurrentUser;
use crate::ServerState;

/// Streams `?d=<path>` from the document root if the user may read it.
///
/// The query is read as raw pairs so a malformed or repeated `d` never turns
/// into a 400 before the gate runs. When `d` repeats, the last value wins.
pub async fn serve(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    request: Request,
) -> Response {
    let requested = match &query {
        Ok(Query(pairs)) => requested_path(pairs),
        Err(_) => None,
    };
    state.gate.serve(user.as_ref(), requested, request).await
}

fn requested_path(pairs: &[(String, String)]) -> Option<&str> {
    pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "d")
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn last_d_wins() {
        let query = pairs(&[("d", "first.png"), ("x", "1"), ("d", "second.png")]);
        assert_eq!(requested_path(&query), Some("second.png"));
    }

    #[test]
    fn missing_d_is_none() {
        assert_eq!(requested_path(&pairs(&[("x", "1")])), None);
        assert_eq!(requested_path(&[]), None);
    }
}
