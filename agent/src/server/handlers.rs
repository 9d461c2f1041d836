//! HTTP request handlers
//!
//! Status codes here are contractual: webhook senders retry on non-2xx, so
//! an unmatched webhook still answers 200, and conflict/provisioning
//! failures map to the codes the CLI expects.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::authn::token::{header_token, validate_token};
use crate::deploy::trigger::{self, WebhookPayload};
use crate::errors::AgentError;
use crate::models::project::Environment;
use crate::server::state::ServerState;
use crate::vpn::provisioner::onboarding_instructions;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "convoy-agent".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Webhook handler for push events from source-control hosts.
///
/// Git services don't send custom headers, so the token rides in the URL.
pub async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    Path(api_token): Path<String>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    if !validate_token(Some(&api_token), &state.api_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid api token"})),
        )
            .into_response();
    }

    let event = match trigger::extract_push_event(&payload) {
        Ok(event) => event,
        Err(e) => return (StatusCode::FORBIDDEN, e.to_string()).into_response(),
    };

    match trigger::handle_webhook(&state.projects, &event).await {
        // Matched and unmatched both answer 200: senders retry on non-2xx,
        // and the registered project set must not leak.
        Ok(_) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => {
            error!("Webhook processing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Deploy credentials response
#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub ssh_pub_key: String,
    pub webhook_url: String,
}

/// Deploy credentials handler.
///
/// Returns what a hosting service needs to reach this agent: the SSH public
/// key to grant read access with, and the webhook URL to notify.
pub async fn credentials_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let ssh_pub_key = state
        .ssh_public_key_file
        .read_string()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(CredentialsResponse {
        ssh_pub_key,
        webhook_url: format!("https://{}/deploy/{}", state.domain, state.api_token),
    }))
}

/// Service registration request
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub git_url: String,
    pub environments: Vec<Environment>,
}

/// Service registration handler
pub async fn create_service_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<CreateServiceRequest>,
) -> Response {
    if !validate_token(header_token(&headers), &state.api_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid api token"})),
        )
            .into_response();
    }

    match state
        .projects
        .register(&request.git_url, request.environments)
        .await
    {
        Ok(_) => (StatusCode::CREATED, Json(json!({}))).into_response(),
        Err(AgentError::Conflict(msg)) => {
            (StatusCode::CONFLICT, Json(json!({"msg": msg}))).into_response()
        }
        Err(e) => {
            error!("Project registration failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Node onboarding request
#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    pub name: String,
}

/// Node onboarding handler.
///
/// Only reachable from localhost or from within the overlay network, which
/// is why the route carries no token check of its own.
pub async fn add_vpn_node_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AddNodeRequest>,
) -> Response {
    match state
        .vpn_nodes
        .add_node(&request.name, &state.provisioner)
        .await
    {
        Ok(onboarded) => (
            StatusCode::CREATED,
            onboarding_instructions(&state.domain, &onboarded.archive.uuid),
        )
            .into_response(),
        Err(
            AgentError::Validation(msg) | AgentError::Provisioning(msg) | AgentError::Allocation(msg),
        ) => (StatusCode::FORBIDDEN, Json(json!({"msg": msg}))).into_response(),
        Err(e) => {
            error!("Node onboarding failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// One-time archive download handler
pub async fn join_vpn_handler(
    State(state): State<Arc<ServerState>>,
    Path(archive_uuid): Path<String>,
) -> Response {
    // A non-UUID path segment can't name an archive; answering 404 keeps
    // the route free of path probing.
    let Ok(uuid) = Uuid::parse_str(&archive_uuid) else {
        return (
            StatusCode::NOT_FOUND,
            "The setup archive was not found. An archive can be downloaded \
             only once; add a new VPN node to generate another one.",
        )
            .into_response();
    };

    match state.archives.claim(&uuid).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=convoy-vpn-setup.tar.gz",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(AgentError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg).into_response(),
        Err(e) => {
            error!("Archive download failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
