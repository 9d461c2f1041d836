//! Project and environment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment status of an environment.
///
/// Only `to_deploy` and `deployed` are acted on by this agent. Callers may
/// store their own statuses; those round-trip through persistence unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvironmentStatus {
    #[default]
    ToDeploy,
    Deployed,
    Other(String),
}

impl From<String> for EnvironmentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "to_deploy" => EnvironmentStatus::ToDeploy,
            "deployed" => EnvironmentStatus::Deployed,
            _ => EnvironmentStatus::Other(s),
        }
    }
}

impl From<EnvironmentStatus> for String {
    fn from(status: EnvironmentStatus) -> Self {
        match status {
            EnvironmentStatus::ToDeploy => "to_deploy".to_string(),
            EnvironmentStatus::Deployed => "deployed".to_string(),
            EnvironmentStatus::Other(s) => s,
        }
    }
}

/// A named deployment target within a project.
///
/// Identity within a project is the branch name; branch uniqueness per
/// project is assumed from the caller, not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Branch this environment deploys from
    pub branch: String,

    /// Current deployment status
    #[serde(default)]
    pub status: EnvironmentStatus,

    /// Caller-supplied fields, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A registered deployable project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique opaque identifier
    pub id: String,

    /// Repository name
    pub name: String,

    /// "<workspace>/<repository>" as reported by webhook payloads
    pub full_name: String,

    /// Unique clone URL
    pub git_url: String,

    /// Branch-scoped deployment targets
    pub environments: Vec<Environment>,

    /// Registration timestamp
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}
