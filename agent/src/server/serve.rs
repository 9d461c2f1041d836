//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::AgentError;
use crate::server::handlers::{
    add_vpn_node_handler, create_service_handler, credentials_handler, health_handler,
    join_vpn_handler, version_handler, webhook_handler,
};
use crate::server::state::ServerState;

/// Build the agent's HTTP router
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployment trigger flow
        .route("/deploy/credentials", get(credentials_handler))
        .route("/deploy/{api_token}", post(webhook_handler))
        .route("/service", post(create_service_handler))
        // VPN node onboarding flow
        .route("/vpn_node", post(add_vpn_node_handler))
        .route("/join_vpn/{archive_uuid}", get(join_vpn_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), AgentError>>, AgentError> {
    let app = build_router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentError::Server(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| AgentError::Server(e.to_string()))
    });

    Ok(handle)
}
