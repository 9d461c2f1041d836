//! Services document management
//!
//! The services document is the durable copy of the project registry. It is
//! rewritten in full after each mutating operation; there is no delta
//! persistence.

use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::project::Project;

/// Load the list of registered projects.
///
/// A missing document means no projects have been registered yet.
pub async fn load_services(services_file: &File) -> Result<Vec<Project>, AgentError> {
    if !services_file.exists().await {
        debug!("No services document at {:?}, starting empty", services_file.path());
        return Ok(Vec::new());
    }

    services_file.read_json().await
}

/// Save the full list of registered projects
pub async fn save_services(services_file: &File, projects: &[Project]) -> Result<(), AgentError> {
    services_file.write_json(&projects).await
}
