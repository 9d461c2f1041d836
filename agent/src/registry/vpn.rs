//! VPN node registry and onboarding
//!
//! The node list lives inside the node configuration document. Onboarding
//! holds the registry lock across external credential issuance: the name
//! conflict check, IP allocation, provisioning, and the final append are
//! one atomic step, so concurrent calls cannot allocate the same IP or
//! register the same name, and a provisioning failure leaves the registry
//! untouched.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::node::VpnNode;
use crate::registry::alloc::allocate_private_ip;
use crate::storage::node_config::{save_node_config, ServiceNodeConfig};
use crate::vpn::provisioner::{CredentialArchive, CredentialProvisioner};

/// A successfully onboarded node and its downloadable credentials
#[derive(Debug, Clone)]
pub struct OnboardedNode {
    pub node: VpnNode,
    pub archive: CredentialArchive,
}

/// Registry of overlay-network nodes
pub struct VpnNodeRegistry {
    config: Mutex<ServiceNodeConfig>,
    config_file: Arc<File>,
}

impl VpnNodeRegistry {
    /// Create a registry over the loaded node configuration
    pub fn new(config: ServiceNodeConfig, config_file: Arc<File>) -> Self {
        Self {
            config: Mutex::new(config),
            config_file,
        }
    }

    /// Onboard a new node: allocate an IP, issue credentials, register.
    ///
    /// The node is registered only after the external credential issuance
    /// has succeeded.
    pub async fn add_node(
        &self,
        name: &str,
        provisioner: &CredentialProvisioner,
    ) -> Result<OnboardedNode, AgentError> {
        let mut config = self.config.lock().await;

        if config.vpn_nodes.iter().any(|node| node.name == name) {
            return Err(AgentError::Validation(format!(
                "The node with name {} already exists. Use another name.",
                name
            )));
        }

        let ip = allocate_private_ip(&config.vpn_nodes)?;
        info!("Adding new VPN node {} with private IP {}", name, ip);

        let archive = provisioner.provision(name, &ip).await?;

        let node = VpnNode {
            name: name.to_string(),
            ip,
        };
        config.vpn_nodes.push(node.clone());
        save_node_config(&self.config_file, &config).await?;

        Ok(OnboardedNode { node, archive })
    }

    /// Snapshot of all registered nodes
    pub async fn nodes(&self) -> Vec<VpnNode> {
        self.config.lock().await.vpn_nodes.clone()
    }
}
