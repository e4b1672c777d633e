//! HTTP server for the labelhost labeling platform.
//!
//! Wires the local file gate, version and health checks, feature flag
//! exposure and the landing redirect into an Axum router.

pub mod auth;
pub mod db;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::get;
use axum::Router;
use labelhost_config::{FeatureFlags, ServerConfig};
use labelhost_core::Authenticator;
use labelhost_files::LocalFileGate;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::SqliteStore;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub config: ServerConfig,
    pub auth: Arc<dyn Authenticator>,
    pub gate: LocalFileGate,
    pub flags: FeatureFlags,
}

impl ServerState {
    /// Builds the state with `store` backing every collaborator.
    pub fn new(config: ServerConfig, store: Arc<SqliteStore>, flags: FeatureFlags) -> Self {
        let gate = LocalFileGate::new(&config.local_files, store.clone(), store.clone());
        Self {
            config,
            auth: store,
            gate,
            flags,
        }
    }
}

/// Builds the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/", get(handlers::main_page::index))
        .route("/data/local-files", get(handlers::local_files::serve))
        .route("/data/local-files/", get(handlers::local_files::serve))
        .route("/version", get(handlers::version::page))
        .route("/api/version", get(handlers::version::json))
        .route("/feature-flags", get(handlers::feature_flags::list))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
