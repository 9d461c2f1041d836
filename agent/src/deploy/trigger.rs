//! Webhook-driven deployment trigger
//!
//! Consumes push webhooks from source-control hosts and flips the matching
//! environment to `to_deploy`. Actually executing the deployment is the
//! deploy worker's job, not this agent's.

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::registry::projects::ProjectRegistry;

/// Push webhook payload.
///
/// Fields are optional so that a structurally wrong payload surfaces as a
/// validation failure instead of a body-rejection.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub repository: Option<WebhookRepository>,
    pub push: Option<WebhookPush>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub name: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPush {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub new: Option<WebhookChangeTarget>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChangeTarget {
    pub name: Option<String>,
}

/// A push event extracted from a webhook payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo_name: String,
    pub full_name: String,
    pub branch: String,
}

/// Result of handling a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A registered environment was queued for deployment
    Matched,

    /// No registered project or branch matched; deliberately not an error
    Unmatched,
}

/// Extract the push event from a webhook payload.
///
/// Fails when the expected repository/push structure is missing.
pub fn extract_push_event(payload: &WebhookPayload) -> Result<PushEvent, AgentError> {
    let repository = payload
        .repository
        .as_ref()
        .ok_or_else(|| AgentError::Validation("Webhook payload has no repository".to_string()))?;

    let full_name = repository
        .full_name
        .clone()
        .ok_or_else(|| AgentError::Validation("Webhook repository has no full_name".to_string()))?;

    let branch = payload
        .push
        .as_ref()
        .and_then(|push| push.changes.first())
        .and_then(|change| change.new.as_ref())
        .and_then(|target| target.name.clone())
        .ok_or_else(|| AgentError::Validation("Webhook payload has no push changes".to_string()))?;

    Ok(PushEvent {
        repo_name: repository.name.clone().unwrap_or_else(|| full_name.clone()),
        full_name,
        branch,
    })
}

/// Handle a push event against the project registry.
///
/// An unmatched event leaves all state unchanged and is reported as a
/// success to the caller: webhook senders retry aggressively on non-2xx
/// responses, and which repositories are registered here must not leak.
pub async fn handle_webhook(
    projects: &ProjectRegistry,
    event: &PushEvent,
) -> Result<TriggerOutcome, AgentError> {
    info!("Push event: {} (branch: {})", event.repo_name, event.branch);

    let matched = projects
        .mark_environment_to_deploy(&event.full_name, &event.branch)
        .await?;

    if matched {
        info!(
            "Environment '{}' of '{}' queued for deployment",
            event.branch, event.full_name
        );
        Ok(TriggerOutcome::Matched)
    } else {
        debug!(
            "No registered environment for {} (branch: {})",
            event.full_name, event.branch
        );
        Ok(TriggerOutcome::Unmatched)
    }
}
