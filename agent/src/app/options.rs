//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::layout::StorageLayout;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Storage configuration
    pub storage: StorageOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// VPN onboarding configuration
    pub vpn: VpnOptions,
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// VPN onboarding options
#[derive(Debug, Clone)]
pub struct VpnOptions {
    /// Certificate-issuing binary
    pub cert_bin: PathBuf,

    /// Groups embedded in issued certificates
    pub cert_groups: String,

    /// Bound on certificate issuance time
    pub sign_timeout: Duration,
}

impl Default for VpnOptions {
    fn default() -> Self {
        Self {
            cert_bin: PathBuf::from("nebula-cert"),
            cert_groups: "devs".to_string(),
            sign_timeout: Duration::from_secs(60),
        }
    }
}
