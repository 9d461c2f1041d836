//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the services document (registered projects)
    pub fn services_file(&self) -> File {
        File::new(self.base_dir.join("services.json"))
    }

    /// Get the node configuration document
    pub fn node_config_file(&self) -> File {
        File::new(self.base_dir.join("node_config.json"))
    }

    /// Get the directory holding pending credential archives
    pub fn archives_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("archives"))
    }

    /// Get the directory holding VPN certificate material.
    ///
    /// Must contain `ca.crt` and `node_config.yaml`; the certificate tool
    /// writes issued host certificates and keys here.
    pub fn vpn_material_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("vpn"))
    }

    /// Get the local SSH public key served to deploy targets
    pub fn ssh_public_key_file(&self) -> File {
        let ssh_dir = home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ssh");
        File::new(ssh_dir.join("id_rsa.pub"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::AgentError> {
        self.archives_dir().create().await?;
        self.vpn_material_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /etc/convoy on Linux, or user home directory on other platforms
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/convoy");

        #[cfg(not(target_os = "linux"))]
        let base_dir = home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".convoy");

        Self::new(base_dir)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
