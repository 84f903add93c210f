//! `taxwise serve` -- HTTP JSON API over the session service.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, `TAXWISE_RATE_LIMIT`)
//! - Optional API key authentication via `TAXWISE_API_KEY`
//!
//! Endpoints:
//! - GET    /health               - Server status (exempt from auth)
//! - POST   /sessions             - Start a session from user details
//! - GET    /sessions/{id}        - Full session state
//! - POST   /sessions/{id}/reply  - Answer the outstanding fact request
//! - POST   /sessions/{id}/chat   - Follow-up chat once the verdict exists
//! - DELETE /sessions/{id}        - Cancel a session waiting for input
//!
//! A reply naming the wrong request id is a 409; an unknown session a 404.
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use self::handlers::{
    handle_cancel, handle_chat, handle_get, handle_health, handle_not_found, handle_reply,
    handle_start,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::Config;
use crate::services::open_service;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_start))
        .route("/sessions/{id}", get(handle_get).delete(handle_cancel))
        .route("/sessions/{id}/reply", post(handle_reply))
        .route("/sessions/{id}/chat", post(handle_chat))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server. `port` overrides the configured port.
///
/// When TLS cert/key paths are provided (and the `tls` feature is on), the
/// server listens over HTTPS using `axum-server` with rustls.
pub(crate) async fn start_server(
    config: Config,
    port: Option<u16>,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = open_service(&config).await?;
    let port = port.unwrap_or(config.port);

    if config.api_key.is_some() {
        info!("API key authentication enabled");
    }
    info!(
        rate_limit = config.rate_limit,
        state_dir = %config.state_dir.display(),
        "session service ready"
    );

    let state = Arc::new(AppState {
        sessions,
        rate_limiter: RateLimiter::new(config.rate_limit),
        api_key: config.api_key.clone(),
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: SocketAddr = addr.parse()?;
        info!("taxwise listening on https://{}", socket_addr);
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        return Ok(());
    }

    #[cfg(not(feature = "tls"))]
    if _tls_cert.is_some() {
        warn!("built without the tls feature; serving plain HTTP");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("taxwise listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
