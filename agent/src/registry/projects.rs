//! Project registry
//!
//! In-memory catalog of registered projects, backed by the services
//! document. All mutations happen under a single write guard that is held
//! across the persistence call, so a conflict check and the append it
//! guards cannot interleave with another writer.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::deploy::repo_url::parse_repo_url;
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::project::{Environment, EnvironmentStatus, Project};
use crate::registry::alloc::allocate_project_id;
use crate::storage::services::save_services;

/// Registry of deployable projects
pub struct ProjectRegistry {
    projects: RwLock<Vec<Project>>,
    services_file: Arc<File>,
}

impl ProjectRegistry {
    /// Create a registry over an already-loaded project list
    pub fn new(projects: Vec<Project>, services_file: Arc<File>) -> Self {
        Self {
            projects: RwLock::new(projects),
            services_file,
        }
    }

    /// Register a new project.
    ///
    /// Fails with a conflict when a project with the same git URL already
    /// exists; the existing project is left untouched. Every supplied
    /// environment starts out queued for deployment.
    pub async fn register(
        &self,
        git_url: &str,
        mut environments: Vec<Environment>,
    ) -> Result<Project, AgentError> {
        let mut projects = self.projects.write().await;

        if projects.iter().any(|p| p.git_url == git_url) {
            return Err(AgentError::Conflict(format!(
                "Project with git url {} already exists. Use PUT /service to update a project.",
                git_url
            )));
        }

        let id = allocate_project_id(|candidate| projects.iter().any(|p| p.id == candidate))?;

        let coords = parse_repo_url(git_url);

        for environment in &mut environments {
            environment.status = EnvironmentStatus::ToDeploy;
        }

        let project = Project {
            id,
            name: coords.name,
            full_name: coords.full_name,
            git_url: git_url.to_string(),
            environments,
            registered_at: chrono::Utc::now(),
        };

        projects.push(project.clone());
        save_services(&self.services_file, &projects).await?;

        info!("New project registered: {} ({})", project.full_name, project.id);
        Ok(project)
    }

    /// Look up a project by its git URL
    pub async fn find_by_git_url(&self, git_url: &str) -> Option<Project> {
        let projects = self.projects.read().await;
        projects.iter().find(|p| p.git_url == git_url).cloned()
    }

    /// Look up a project by its "<workspace>/<repository>" full name
    pub async fn find_by_full_name(&self, full_name: &str) -> Option<Project> {
        let projects = self.projects.read().await;
        projects.iter().find(|p| p.full_name == full_name).cloned()
    }

    /// Queue an environment for deployment.
    ///
    /// Returns `false` without touching any state when the project or
    /// branch is not registered.
    pub async fn mark_environment_to_deploy(
        &self,
        full_name: &str,
        branch: &str,
    ) -> Result<bool, AgentError> {
        let mut projects = self.projects.write().await;

        let matched = match projects.iter_mut().find(|p| p.full_name == full_name) {
            Some(project) => {
                match project.environments.iter_mut().find(|e| e.branch == branch) {
                    Some(environment) => {
                        environment.status = EnvironmentStatus::ToDeploy;
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };

        if !matched {
            return Ok(false);
        }

        save_services(&self.services_file, &projects).await?;
        Ok(true)
    }

    /// Snapshot of all registered projects
    pub async fn list(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }
}
