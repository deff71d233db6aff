//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, and all
//! endpoint handlers. Everything under `/api` sits behind bearer auth.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use valet_core::ValetError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS: allow localhost origins on the configured port plus port+1
    // for a dev server.
    let port = state.port;
    let dev_port = port.saturating_add(1);
    let max_body_bytes = state.max_body_kb.saturating_mul(1024);
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
        format!("http://127.0.0.1:{}", dev_port),
        format!("http://localhost:{}", dev_port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static("x-user-id"),
        ]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route(
            "/api/actions",
            get(handlers::list_actions).post(handlers::submit_action),
        )
        .route("/api/actions/{id}", get(handlers::get_action))
        .route("/api/actions/{id}/approve", post(handlers::approve_action))
        .route("/api/actions/{id}/reject", post(handlers::reject_action))
        .route("/api/actions/{id}/undo", post(handlers::undo_action))
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/settings/{kind}", put(handlers::update_setting))
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/unread_count",
            get(handlers::unread_count),
        )
        .route(
            "/api/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/api/notifications/{id}/dismiss",
            post(handlers::dismiss_notification),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// Binds to 127.0.0.1 (localhost only); the API is an internal surface.
pub async fn start_server(state: AppState) -> Result<(), ValetError> {
    let addr = format!("127.0.0.1:{}", state.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ValetError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| ValetError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
