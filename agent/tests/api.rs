//! HTTP API tests
//!
//! Drives the agent's router end to end over temporary storage, with the
//! external certificate tool faked by `true`/`false` binaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use convoyd::filesys::dir::Dir;
use convoyd::filesys::file::File;
use convoyd::models::project::{Environment, EnvironmentStatus, Project};
use convoyd::registry::alloc::{VPN_HOST_MAX, VPN_HOST_MIN, VPN_SUBNET_PREFIX};
use convoyd::registry::projects::ProjectRegistry;
use convoyd::registry::vpn::VpnNodeRegistry;
use convoyd::server::serve::build_router;
use convoyd::server::state::ServerState;
use convoyd::storage::layout::StorageLayout;
use convoyd::storage::node_config::{save_node_config, ServiceNodeConfig};
use convoyd::vpn::archive::ArchiveStore;
use convoyd::vpn::provisioner::{CredentialProvisioner, ProvisionerOptions};

const DOMAIN: &str = "deploy.example.com";
const TOKEN: &str = "sekret-token";
const SSH_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2E test@convoy\n";

/// Build a server state over a fresh temporary storage layout
async fn test_state(cert_bin: &str) -> Arc<ServerState> {
    let base = Dir::create_temp_dir("convoy-api-test").await.unwrap();
    let layout = StorageLayout::new(base.path());
    layout.setup().await.unwrap();

    let config = ServiceNodeConfig {
        domain: DOMAIN.to_string(),
        api_token: TOKEN.to_string(),
        vpn_nodes: Vec::new(),
    };
    let config_file = Arc::new(layout.node_config_file());
    save_node_config(&config_file, &config).await.unwrap();

    let ssh_key_file = base.file("id_rsa.pub");
    ssh_key_file.write_string(SSH_KEY).await.unwrap();

    let material = layout.vpn_material_dir();
    material.file("ca.crt").write_string("ca-cert").await.unwrap();
    material
        .file("node_config.yaml")
        .write_string("overlay: config")
        .await
        .unwrap();

    let services_file = Arc::new(layout.services_file());
    let projects = Arc::new(ProjectRegistry::new(Vec::new(), services_file));
    let archives = Arc::new(ArchiveStore::new(layout.archives_dir()));
    let provisioner = Arc::new(CredentialProvisioner::new(
        ProvisionerOptions {
            cert_bin: PathBuf::from(cert_bin),
            cert_groups: "devs".to_string(),
            sign_timeout: Duration::from_secs(5),
            material_dir: material,
        },
        archives.clone(),
    ));
    let vpn_nodes = Arc::new(VpnNodeRegistry::new(config, config_file));

    Arc::new(ServerState {
        domain: DOMAIN.to_string(),
        api_token: TOKEN.to_string(),
        ssh_public_key_file: Arc::new(ssh_key_file),
        projects,
        vpn_nodes,
        provisioner,
        archives,
    })
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_authed(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("api-token", TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A pre-registered project with one already-deployed environment
fn seeded_project() -> Project {
    Project {
        id: "a1b2c3d4e5".to_string(),
        name: "widget".to_string(),
        full_name: "acme/widget".to_string(),
        git_url: "https://bitbucket.org/acme/widget.git".to_string(),
        environments: vec![Environment {
            branch: "main".to_string(),
            status: EnvironmentStatus::Deployed,
            extra: serde_json::Map::new(),
        }],
        registered_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_health_and_version() {
    let state = test_state("true").await;
    let router = build_router(state);

    let response = router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/version")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_project() {
    let state = test_state("true").await;
    let router = build_router(state.clone());

    let response = router
        .oneshot(post_json_authed(
            "/service",
            r#"{"git_url": "https://bitbucket.org/acme/widget.git",
                "environments": [{"branch": "main"}, {"branch": "staging", "status": "deployed"}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let project = state.projects.find_by_full_name("acme/widget").await.unwrap();
    assert_eq!(project.name, "widget");
    assert_eq!(project.git_url, "https://bitbucket.org/acme/widget.git");

    let by_url = state
        .projects
        .find_by_git_url("https://bitbucket.org/acme/widget.git")
        .await
        .unwrap();
    assert_eq!(by_url.id, project.id);

    // Every supplied environment starts out queued for deployment
    assert!(project
        .environments
        .iter()
        .all(|e| e.status == EnvironmentStatus::ToDeploy));
}

#[tokio::test]
async fn test_register_requires_token() {
    let state = test_state("true").await;
    let router = build_router(state.clone());

    let response = router
        .oneshot(post_json(
            "/service",
            r#"{"git_url": "https://bitbucket.org/acme/widget.git", "environments": []}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(state.projects.list().await.is_empty());
}

#[tokio::test]
async fn test_register_duplicate_git_url_conflicts() {
    let state = test_state("true").await;
    let router = build_router(state.clone());

    let body = r#"{"git_url": "https://bitbucket.org/acme/widget.git",
                   "environments": [{"branch": "main"}]}"#;

    let response = router
        .clone()
        .oneshot(post_json_authed("/service", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let original = state.projects.list().await.remove(0);

    let response = router
        .oneshot(post_json_authed("/service", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The existing project is untouched
    let projects = state.projects.list().await;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, original.id);
}

#[tokio::test]
async fn test_webhook_for_unregistered_branch_still_succeeds() {
    let state = test_state("true").await;
    state
        .projects
        .register("https://bitbucket.org/acme/widget.git", vec![])
        .await
        .unwrap();

    let router = build_router(state.clone());
    let response = router
        .oneshot(post_json(
            &format!("/deploy/{}", TOKEN),
            r#"{"repository": {"name": "widget", "full_name": "acme/widget"},
                "push": {"changes": [{"new": {"name": "main"}}]}}"#,
        ))
        .await
        .unwrap();

    // Branch "main" isn't registered as an environment, so this is an
    // unmatched webhook; it still answers 200 with an empty object.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{}");
}

#[tokio::test]
async fn test_webhook_transitions_seeded_environment() {
    // Seed a project whose environment has already been deployed, then
    // push its branch through the webhook route.
    let state = test_state("true").await;
    let seed_dir = Dir::create_temp_dir("convoy-seed").await.unwrap();
    let services_file = Arc::new(File::new(seed_dir.path().join("services.json")));
    let projects = Arc::new(ProjectRegistry::new(vec![seeded_project()], services_file));

    let state = Arc::new(ServerState {
        domain: state.domain.clone(),
        api_token: state.api_token.clone(),
        ssh_public_key_file: state.ssh_public_key_file.clone(),
        projects,
        vpn_nodes: state.vpn_nodes.clone(),
        provisioner: state.provisioner.clone(),
        archives: state.archives.clone(),
    });

    let router = build_router(state.clone());
    let response = router
        .oneshot(post_json(
            &format!("/deploy/{}", TOKEN),
            r#"{"repository": {"name": "widget", "full_name": "acme/widget"},
                "push": {"changes": [{"new": {"name": "main"}}]}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{}");

    let project = state.projects.find_by_full_name("acme/widget").await.unwrap();
    assert_eq!(project.environments[0].status, EnvironmentStatus::ToDeploy);
}

#[tokio::test]
async fn test_webhook_unmatched_leaves_state_unchanged() {
    let state = test_state("true").await;
    state
        .projects
        .register(
            "https://bitbucket.org/acme/widget.git",
            vec![Environment {
                branch: "main".to_string(),
                status: EnvironmentStatus::ToDeploy,
                extra: serde_json::Map::new(),
            }],
        )
        .await
        .unwrap();
    let before = state.projects.list().await;

    let router = build_router(state.clone());
    let response = router
        .oneshot(post_json(
            &format!("/deploy/{}", TOKEN),
            r#"{"repository": {"name": "other", "full_name": "acme/other"},
                "push": {"changes": [{"new": {"name": "main"}}]}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "{}");

    let after = state.projects.list().await;
    assert_eq!(before.len(), after.len());
    assert_eq!(before[0].environments[0].status, after[0].environments[0].status);
}

#[tokio::test]
async fn test_webhook_rejects_bad_token() {
    let state = test_state("true").await;
    let router = build_router(state);

    let response = router
        .oneshot(post_json(
            "/deploy/wrong-token",
            r#"{"repository": {"name": "w", "full_name": "acme/w"},
                "push": {"changes": [{"new": {"name": "main"}}]}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_rejects_missing_repository() {
    let state = test_state("true").await;
    let router = build_router(state);

    let response = router
        .oneshot(post_json(
            &format!("/deploy/{}", TOKEN),
            r#"{"push": {"changes": [{"new": {"name": "main"}}]}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_credentials_are_idempotent() {
    let state = test_state("true").await;
    let router = build_router(state);

    let first = body_string(
        build_and_call(&router, get("/deploy/credentials")).await,
    )
    .await;
    let second = body_string(
        build_and_call(&router, get("/deploy/credentials")).await,
    )
    .await;

    assert_eq!(first, second);

    let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(parsed["ssh_pub_key"], SSH_KEY);
    assert_eq!(
        parsed["webhook_url"],
        format!("https://{}/deploy/{}", DOMAIN, TOKEN)
    );
}

async fn build_and_call(
    router: &axum::Router,
    request: Request<Body>,
) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_onboard_node_and_download_archive_once() {
    let state = test_state("true").await;

    // `true` exits 0 without writing certificates, so provide the per-node
    // key material the real tool would have produced.
    let material = state_material(&state);
    material.file("node1.crt").write_string("host-cert").await.unwrap();
    material.file("node1.key").write_string("host-key").await.unwrap();

    let router = build_router(state.clone());
    let response = router
        .clone()
        .oneshot(post_json("/vpn_node", r#"{"name": "node1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let instructions = body_string(response).await;
    assert!(instructions.contains(&format!("https://{}/join_vpn/", DOMAIN)));

    // The node is registered with an in-range IP
    let nodes = state.vpn_nodes.nodes().await;
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "node1");
    let host: u8 = nodes[0]
        .ip
        .strip_prefix(VPN_SUBNET_PREFIX)
        .unwrap()
        .parse()
        .unwrap();
    assert!((VPN_HOST_MIN..=VPN_HOST_MAX).contains(&host));

    // First download wins
    let uuid = extract_uuid(&instructions);
    let response = router
        .clone()
        .oneshot(get(&format!("/join_vpn/{}", uuid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b], "archive should be gzip");

    // Second download of the same archive is gone
    let response = router
        .oneshot(get(&format!("/join_vpn/{}", uuid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_onboard_duplicate_name_is_rejected() {
    let state = test_state("true").await;
    let material = state_material(&state);
    material.file("node1.crt").write_string("host-cert").await.unwrap();
    material.file("node1.key").write_string("host-key").await.unwrap();

    let router = build_router(state.clone());
    let response = router
        .clone()
        .oneshot(post_json("/vpn_node", r#"{"name": "node1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(post_json("/vpn_node", r#"{"name": "node1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.vpn_nodes.nodes().await.len(), 1);
}

#[tokio::test]
async fn test_onboard_provisioning_failure_registers_nothing() {
    let state = test_state("false").await;
    let router = build_router(state.clone());

    let response = router
        .oneshot(post_json("/vpn_node", r#"{"name": "node1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.vpn_nodes.nodes().await.is_empty());
}

#[tokio::test]
async fn test_join_vpn_unknown_archive_is_not_found() {
    let state = test_state("true").await;
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(get("/join_vpn/00000000-0000-4000-8000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A non-UUID segment is indistinguishable from a consumed archive
    let response = router
        .oneshot(get("/join_vpn/../../etc/passwd"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// The provisioner's material dir, recovered from the server state
fn state_material(state: &ServerState) -> Dir {
    // The test layout keeps material under <base>/vpn next to the ssh key
    let base = state
        .ssh_public_key_file
        .path()
        .parent()
        .unwrap()
        .to_path_buf();
    Dir::new(base.join("vpn"))
}

/// Pull the archive UUID out of the onboarding instructions
fn extract_uuid(instructions: &str) -> String {
    let start = instructions.find("/join_vpn/").unwrap() + "/join_vpn/".len();
    instructions[start..start + 36].to_string()
}
