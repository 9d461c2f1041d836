//! Credential provisioner
//!
//! Issues overlay-network credentials for a new node: runs the external
//! certificate tool, gathers the four bundle artifacts into a scratch
//! directory, and packages them into a one-time downloadable archive.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::vpn::archive::ArchiveStore;

/// Artifacts every credential bundle contains, by archive entry name
const BUNDLE_FILES: [&str; 4] = ["ca.crt", "config.yaml", "host.crt", "host.key"];

/// Provisioner configuration
#[derive(Debug, Clone)]
pub struct ProvisionerOptions {
    /// Certificate-issuing binary
    pub cert_bin: PathBuf,

    /// Groups embedded in issued certificates
    pub cert_groups: String,

    /// Bound on certificate issuance time
    pub sign_timeout: Duration,

    /// Directory holding `ca.crt`, `node_config.yaml`, and tool output
    pub material_dir: Dir,
}

/// A packaged one-time credential archive
#[derive(Debug, Clone)]
pub struct CredentialArchive {
    pub uuid: Uuid,
    pub path: PathBuf,
}

/// Issues credentials and packages one-time download archives
pub struct CredentialProvisioner {
    options: ProvisionerOptions,
    archives: Arc<ArchiveStore>,
}

impl CredentialProvisioner {
    /// Create a new provisioner
    pub fn new(options: ProvisionerOptions, archives: Arc<ArchiveStore>) -> Self {
        Self { options, archives }
    }

    /// Issue credentials for `(name, ip)` and package them for download.
    ///
    /// Nothing outside the material directory is touched until the external
    /// tool has succeeded, so a failure here leaves no bundle state behind
    /// for the caller to roll back.
    pub async fn provision(&self, name: &str, ip: &str) -> Result<CredentialArchive, AgentError> {
        self.issue_certificate(name, ip).await?;
        info!("Certificate issued for node {} ({})", name, ip);

        let uuid = Uuid::new_v4();
        let scratch = Dir::create_temp_dir("convoy-bundle").await?;

        let assembled = self.assemble_bundle(name, &scratch).await;
        let packed = match assembled {
            Ok(()) => {
                let archive_path = self.archives.pending_path(&uuid);
                pack_bundle(scratch.path().to_owned(), archive_path.clone())
                    .await
                    .map(|_| CredentialArchive {
                        uuid,
                        path: archive_path,
                    })
            }
            Err(e) => Err(e),
        };

        // The archive keeps its own copies; the scratch directory and the
        // tool's per-node key/cert output are no longer needed either way.
        if let Err(e) = scratch.delete().await {
            warn!("Cannot remove scratch directory {:?}: {}", scratch.path(), e);
        }
        for leftover in [format!("{}.crt", name), format!("{}.key", name)] {
            if let Err(e) = self.options.material_dir.file(&leftover).delete().await {
                warn!("Cannot remove {}: {}", leftover, e);
            }
        }

        let archive = packed?;
        info!("Credential archive {} ready for one-time download", archive.uuid);
        Ok(archive)
    }

    /// Run the external certificate tool under the configured timeout
    async fn issue_certificate(&self, name: &str, ip: &str) -> Result<(), AgentError> {
        let ip_cidr = format!("{}/24", ip);
        let output = Command::new(&self.options.cert_bin)
            .current_dir(self.options.material_dir.path())
            .args([
                "sign",
                "-name",
                name,
                "-ip",
                ip_cidr.as_str(),
                "-groups",
                self.options.cert_groups.as_str(),
            ])
            .kill_on_drop(true)
            .output();

        let output: Output = match timeout(self.options.sign_timeout, output).await {
            Ok(result) => result.map_err(|e| {
                AgentError::Provisioning(format!(
                    "Cannot run certificate tool {:?}: {}",
                    self.options.cert_bin, e
                ))
            })?,
            Err(_) => {
                return Err(AgentError::Provisioning(format!(
                    "Certificate issuance for node {} timed out after {:?}",
                    name, self.options.sign_timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Provisioning(format!(
                "Cannot generate a certificate for node {}: {}",
                name,
                stderr.trim()
            )));
        }

        Ok(())
    }

    /// Copy the four bundle artifacts into the scratch directory
    async fn assemble_bundle(&self, name: &str, scratch: &Dir) -> Result<(), AgentError> {
        let material = &self.options.material_dir;

        let host_crt = format!("{}.crt", name);
        let host_key = format!("{}.key", name);
        let sources = [
            ("ca.crt", "ca.crt"),
            ("node_config.yaml", "config.yaml"),
            (host_crt.as_str(), "host.crt"),
            (host_key.as_str(), "host.key"),
        ];

        for (source, target) in sources {
            tokio::fs::copy(material.file(source).path(), scratch.file(target).path())
                .await
                .map_err(|e| {
                    AgentError::Provisioning(format!(
                        "Cannot assemble credential bundle, missing {}: {}",
                        source, e
                    ))
                })?;
        }

        Ok(())
    }
}

/// Package the bundle directory into a gzipped tar archive
async fn pack_bundle(bundle_dir: PathBuf, archive_path: PathBuf) -> Result<(), AgentError> {
    tokio::task::spawn_blocking(move || pack_bundle_sync(&bundle_dir, &archive_path))
        .await
        .map_err(|e| AgentError::Server(format!("Archive packaging task failed: {}", e)))?
}

fn pack_bundle_sync(bundle_dir: &Path, archive_path: &Path) -> Result<(), AgentError> {
    let file = std::fs::File::create(archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for name in BUNDLE_FILES {
        builder.append_path_with_name(bundle_dir.join(name), name)?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Onboarding instructions returned after a node is provisioned
pub fn onboarding_instructions(domain: &str, archive_uuid: &Uuid) -> String {
    format!(
        "\n\
A new VPN node has been provisioned.\n\
\n\
To connect the new machine to the overlay network:\n\
\n\
- install the Convoy CLI on the new machine:\n\
\n\
    cargo install convoy-cli\n\
\n\
- check that the CLI is installed:\n\
\n\
    convoy --version\n\
\n\
- join the machine to the private network (this server is already a member):\n\
\n\
    convoy join https://{}/join_vpn/{}\n\
\n\
The setup archive behind this link can be downloaded exactly once. If the\n\
download is lost, add the node again under a new name to issue fresh\n\
credentials.\n",
        domain, archive_uuid
    )
}
