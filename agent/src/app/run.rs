//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the Convoy agent until the shutdown signal fires
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing Convoy agent...");

    let app_state = AppState::init(&options).await?;
    let server_state = Arc::new(ServerState::new(&app_state));

    let handle = serve(&options.server, server_state, shutdown_signal).await?;

    match handle.await {
        Ok(result) => result,
        Err(e) => Err(AgentError::Server(format!("Server task failed: {}", e))),
    }
}
