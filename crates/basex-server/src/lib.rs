pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use basex_core::GatewayConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // JSON-LD actions
        .route(
            "/v1/api/semantic/action",
            post(routes::semantic::semantic_action),
        )
        // REST adapters
        .route("/v1/api/queries", post(routes::rest::execute_query))
        .route("/v1/api/transforms", post(routes::rest::execute_transform))
        .route("/v1/api/databases", post(routes::rest::create_database))
        .route(
            "/v1/api/databases/{name}",
            delete(routes::rest::delete_database),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/v1/api/docs", get(routes::health::docs))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind `addr` and serve until SIGINT or SIGTERM.
pub async fn serve(config: GatewayConfig, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(config, listener).await
}

/// Serve on a pre-bound listener until SIGINT or SIGTERM.
///
/// Unlike `serve`, this lets the caller read the actual port first (useful
/// when binding port 0).
pub async fn serve_on(config: GatewayConfig, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let auth = if config.api_key.is_some() {
        "api key required"
    } else {
        "no api key configured"
    };
    let app = build_router(AppState::new(config));

    tracing::info!("basexservice listening on http://{local} ({auth})");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("basexservice stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
