pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    build_router_with_state(state::AppState::new(root))
}

/// Router over a caller-constructed state, for tests that tune the
/// records-watcher interval.
pub fn build_router_with_state(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(routes::status::healthz))
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Webhook intake
        .route("/api/webhook", post(routes::webhook::receive))
        // Reconciliation status
        .route("/api/status", get(routes::status::get_status))
        // Units
        .route("/api/units", get(routes::units::list_units))
        .route("/api/units/{name}", get(routes::units::get_unit))
        .route("/api/units/{name}/history", get(routes::units::get_history))
        // Ingress
        .route("/api/ingress", get(routes::ingress::get_routes))
        .route("/api/ingress/resolve", get(routes::ingress::resolve))
        .layer(cors)
        .with_state(app_state)
}

/// Start the convoy HTTP server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let app = build_router(root);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("convoy server listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
