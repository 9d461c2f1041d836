//! Node configuration document management

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::node::VpnNode;

/// Process-wide node configuration.
///
/// Loaded once at startup; only `vpn_nodes` is mutated afterwards (by node
/// onboarding), and the document is rewritten in full on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNodeConfig {
    /// Public domain this agent is reachable at
    pub domain: String,

    /// API token expected on authenticated requests
    pub api_token: String,

    /// Nodes joined to the overlay network
    #[serde(default)]
    pub vpn_nodes: Vec<VpnNode>,
}

/// Load the node configuration, failing with setup instructions when absent
pub async fn load_node_config(config_file: &File) -> Result<ServiceNodeConfig, AgentError> {
    if !config_file.exists().await {
        return Err(AgentError::Config(format!(
            "Node configuration not found at {:?}. Create it with at least \
             {{\"domain\": \"...\", \"api_token\": \"...\"}}",
            config_file.path()
        )));
    }

    let config: ServiceNodeConfig = config_file.read_json().await?;

    if config.api_token.is_empty() {
        return Err(AgentError::Config(
            "Node configuration has an empty api_token".to_string(),
        ));
    }

    Ok(config)
}

/// Save the full node configuration.
///
/// The document carries the API token, so it is kept owner-only readable.
pub async fn save_node_config(
    config_file: &File,
    config: &ServiceNodeConfig,
) -> Result<(), AgentError> {
    config_file.write_json(config).await?;
    config_file.set_permissions_600().await
}
