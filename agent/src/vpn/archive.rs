//! One-time credential archive store
//!
//! A pending archive is a file on disk named by its UUID; the filesystem is
//! the source of truth for one-time use. Claiming renames the file to a
//! unique name first, so two concurrent downloads of the same UUID cannot
//! both win: the rename either succeeds for exactly one caller or fails
//! with NotFound. Exactly-once remains best-effort across a process crash
//! between the rename and the read.

use std::path::PathBuf;

use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

const ARCHIVE_GONE: &str = "The setup archive was not found. An archive can be downloaded \
     only once; add a new VPN node to generate another one.";

/// Store of pending one-time credential archives
pub struct ArchiveStore {
    dir: Dir,
}

impl ArchiveStore {
    /// Create a store over the archive directory
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    /// Path a pending archive for `uuid` lives at
    pub fn pending_path(&self, uuid: &Uuid) -> PathBuf {
        self.dir.path().join(format!("vpn-setup-{}.tar.gz", uuid))
    }

    /// Claim the archive for `uuid`, returning its bytes.
    ///
    /// The archive is gone afterwards; a second claim for the same UUID
    /// fails with NotFound, as does a claim for a UUID that never existed.
    pub async fn claim(&self, uuid: &Uuid) -> Result<Vec<u8>, AgentError> {
        let pending = self.pending_path(uuid);
        let claimed = self
            .dir
            .path()
            .join(format!("vpn-setup-{}.claimed-{}", uuid, Uuid::new_v4()));

        match fs::rename(&pending, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::NotFound(ARCHIVE_GONE.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let claimed = File::new(claimed);
        let bytes = claimed.read_bytes().await?;

        if let Err(e) = claimed.delete().await {
            warn!("Cannot remove claimed archive {:?}: {}", claimed.path(), e);
        }

        info!("Credential archive {} downloaded and consumed", uuid);
        Ok(bytes)
    }
}
