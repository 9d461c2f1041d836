//! Server state

use std::sync::Arc;

use crate::app::state::AppState;
use crate::filesys::file::File;
use crate::registry::projects::ProjectRegistry;
use crate::registry::vpn::VpnNodeRegistry;
use crate::vpn::archive::ArchiveStore;
use crate::vpn::provisioner::CredentialProvisioner;

/// Server state shared across handlers
pub struct ServerState {
    /// Public domain this agent is reachable at
    pub domain: String,

    /// API token expected on authenticated requests
    pub api_token: String,

    /// Local SSH public key served to deploy targets
    pub ssh_public_key_file: Arc<File>,

    pub projects: Arc<ProjectRegistry>,
    pub vpn_nodes: Arc<VpnNodeRegistry>,
    pub provisioner: Arc<CredentialProvisioner>,
    pub archives: Arc<ArchiveStore>,
}

impl ServerState {
    pub fn new(app: &AppState) -> Self {
        Self {
            domain: app.domain.clone(),
            api_token: app.api_token.clone(),
            ssh_public_key_file: app.ssh_public_key_file.clone(),
            projects: app.projects.clone(),
            vpn_nodes: app.vpn_nodes.clone(),
            provisioner: app.provisioner.clone(),
            archives: app.archives.clone(),
        }
    }
}
