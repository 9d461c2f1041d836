//! Credential provisioner and one-time archive tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use uuid::Uuid;

use convoyd::errors::AgentError;
use convoyd::filesys::dir::Dir;
use convoyd::vpn::archive::ArchiveStore;
use convoyd::vpn::provisioner::{CredentialProvisioner, ProvisionerOptions};

/// Set up a material dir with the fixed artifacts plus pre-issued host
/// certificate material for `name` (the `true` stand-in for the real
/// certificate tool exits 0 without writing anything).
async fn test_dirs(name: &str) -> (Dir, Dir) {
    let base = Dir::create_temp_dir("convoy-provisioner-test").await.unwrap();
    let material = Dir::new(base.path().join("vpn"));
    material.create().await.unwrap();
    let archives = Dir::new(base.path().join("archives"));
    archives.create().await.unwrap();

    material.file("ca.crt").write_string("ca-cert").await.unwrap();
    material
        .file("node_config.yaml")
        .write_string("overlay: config")
        .await
        .unwrap();
    material
        .file(&format!("{}.crt", name))
        .write_string("host-cert")
        .await
        .unwrap();
    material
        .file(&format!("{}.key", name))
        .write_string("host-key")
        .await
        .unwrap();

    (material, archives)
}

fn provisioner(cert_bin: &str, material: Dir, archives: Arc<ArchiveStore>) -> CredentialProvisioner {
    CredentialProvisioner::new(
        ProvisionerOptions {
            cert_bin: PathBuf::from(cert_bin),
            cert_groups: "devs".to_string(),
            sign_timeout: Duration::from_secs(5),
            material_dir: material,
        },
        archives,
    )
}

#[tokio::test]
async fn test_provision_packages_the_four_artifacts() {
    let (material, archives_dir) = test_dirs("node1").await;
    let archives = Arc::new(ArchiveStore::new(archives_dir));
    let provisioner = provisioner("true", material.clone(), archives.clone());

    let archive = provisioner.provision("node1", "192.168.202.7").await.unwrap();
    assert_eq!(archive.path, archives.pending_path(&archive.uuid));

    // The archive holds exactly the four bundle entries
    let raw = std::fs::File::open(&archive.path).unwrap();
    let mut tar = tar::Archive::new(GzDecoder::new(raw));
    let mut entries: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, ["ca.crt", "config.yaml", "host.crt", "host.key"]);

    // The per-node key material is cleaned up after packaging
    assert!(!material.file("node1.crt").exists().await);
    assert!(!material.file("node1.key").exists().await);
    // The shared material stays
    assert!(material.file("ca.crt").exists().await);
}

#[tokio::test]
async fn test_provision_failure_produces_no_archive() {
    let (material, archives_dir) = test_dirs("node1").await;
    let archives_path = archives_dir.path().to_path_buf();
    let archives = Arc::new(ArchiveStore::new(archives_dir));
    let provisioner = provisioner("false", material, archives);

    let result = provisioner.provision("node1", "192.168.202.7").await;
    assert!(matches!(result, Err(AgentError::Provisioning(_))));

    let mut entries = std::fs::read_dir(&archives_path).unwrap();
    assert!(entries.next().is_none(), "no archive should be left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn test_provision_times_out() {
    use std::os::unix::fs::PermissionsExt;

    let (material, archives_dir) = test_dirs("node1").await;

    // A certificate tool that hangs
    let script = material.file("slow-cert");
    script.write_string("#!/bin/sh\nsleep 5\n").await.unwrap();
    let mut perms = std::fs::metadata(script.path()).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(script.path(), perms).unwrap();

    let archives = Arc::new(ArchiveStore::new(archives_dir));
    let slow = CredentialProvisioner::new(
        ProvisionerOptions {
            cert_bin: script.path().to_path_buf(),
            cert_groups: "devs".to_string(),
            sign_timeout: Duration::from_millis(100),
            material_dir: material,
        },
        archives,
    );

    let result = slow.provision("node1", "192.168.202.7").await;
    match result {
        Err(AgentError::Provisioning(msg)) => assert!(msg.contains("timed out")),
        other => panic!("expected provisioning timeout, got {:?}", other.map(|a| a.uuid)),
    }
}

#[tokio::test]
async fn test_archive_claim_is_one_shot() {
    let dir = Dir::create_temp_dir("convoy-archive-test").await.unwrap();
    let store = ArchiveStore::new(dir);

    let uuid = Uuid::new_v4();
    let payload = b"bundle-bytes".to_vec();
    tokio::fs::write(store.pending_path(&uuid), &payload)
        .await
        .unwrap();

    let bytes = store.claim(&uuid).await.unwrap();
    assert_eq!(bytes, payload);

    let second = store.claim(&uuid).await;
    assert!(matches!(second, Err(AgentError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_claims_yield_exactly_one_winner() {
    let dir = Dir::create_temp_dir("convoy-archive-race").await.unwrap();
    let store = Arc::new(ArchiveStore::new(dir));

    let uuid = Uuid::new_v4();
    tokio::fs::write(store.pending_path(&uuid), b"bundle-bytes")
        .await
        .unwrap();

    let (a, b) = tokio::join!(store.claim(&uuid), store.claim(&uuid));
    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_claim_of_unknown_uuid_is_not_found() {
    let dir = Dir::create_temp_dir("convoy-archive-missing").await.unwrap();
    let store = ArchiveStore::new(dir);

    let result = store.claim(&Uuid::new_v4()).await;
    assert!(matches!(result, Err(AgentError::NotFound(_))));
}
