//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Agent settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// VPN onboarding configuration
    #[serde(default)]
    pub vpn: VpnSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// VPN onboarding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnSettings {
    /// Certificate-issuing binary
    #[serde(default = "default_cert_bin")]
    pub cert_bin: String,

    /// Groups embedded in issued certificates
    #[serde(default = "default_cert_groups")]
    pub cert_groups: String,

    /// Timeout for certificate issuance in seconds
    #[serde(default = "default_sign_timeout")]
    pub sign_timeout_secs: u64,
}

fn default_cert_bin() -> String {
    "nebula-cert".to_string()
}

fn default_cert_groups() -> String {
    "devs".to_string()
}

fn default_sign_timeout() -> u64 {
    60
}

impl Default for VpnSettings {
    fn default() -> Self {
        Self {
            cert_bin: default_cert_bin(),
            cert_groups: default_cert_groups(),
            sign_timeout_secs: default_sign_timeout(),
        }
    }
}
