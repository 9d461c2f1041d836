//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::registry::projects::ProjectRegistry;
use crate::registry::vpn::VpnNodeRegistry;
use crate::storage::node_config::load_node_config;
use crate::storage::services::load_services;
use crate::vpn::archive::ArchiveStore;
use crate::vpn::provisioner::{CredentialProvisioner, ProvisionerOptions};

/// Main application state
pub struct AppState {
    /// Public domain this agent is reachable at
    pub domain: String,

    /// API token expected on authenticated requests
    pub api_token: String,

    /// Local SSH public key served to deploy targets
    pub ssh_public_key_file: Arc<File>,

    /// Project registry
    pub projects: Arc<ProjectRegistry>,

    /// VPN node registry
    pub vpn_nodes: Arc<VpnNodeRegistry>,

    /// Credential provisioner
    pub provisioner: Arc<CredentialProvisioner>,

    /// One-time archive store
    pub archives: Arc<ArchiveStore>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, AgentError> {
        info!("Initializing application state...");

        let layout = &options.storage.layout;
        layout.setup().await?;

        // The node configuration is loaded once; everything but the node
        // list is immutable for the lifetime of the process.
        let config_file = Arc::new(layout.node_config_file());
        let config = load_node_config(&config_file).await?;
        let domain = config.domain.clone();
        let api_token = config.api_token.clone();

        let services_file = Arc::new(layout.services_file());
        let services = load_services(&services_file).await?;
        info!("Loaded {} registered projects", services.len());

        let projects = Arc::new(ProjectRegistry::new(services, services_file));

        info!("Loaded {} VPN nodes", config.vpn_nodes.len());
        let vpn_nodes = Arc::new(VpnNodeRegistry::new(config, config_file));

        let archives = Arc::new(ArchiveStore::new(layout.archives_dir()));
        let provisioner = Arc::new(CredentialProvisioner::new(
            ProvisionerOptions {
                cert_bin: options.vpn.cert_bin.clone(),
                cert_groups: options.vpn.cert_groups.clone(),
                sign_timeout: options.vpn.sign_timeout,
                material_dir: layout.vpn_material_dir(),
            },
            archives.clone(),
        ));

        Ok(Self {
            domain,
            api_token,
            ssh_public_key_file: Arc::new(layout.ssh_public_key_file()),
            projects,
            vpn_nodes,
            provisioner,
            archives,
        })
    }
}
