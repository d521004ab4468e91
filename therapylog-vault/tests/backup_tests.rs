mod common;

use common::{client, disk_vault, memory_vault, seed, session, snapshot, PASSWORD};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use therapylog_vault::{BackupBundle, VaultError, VaultStatus, FORMAT_VERSION};

#[tokio::test]
async fn export_embeds_stored_credential() {
    let vault = memory_vault();
    let credential = vault.setup(PASSWORD).await.unwrap();
    vault.save_client(&client("20240101-01", "A")).await.unwrap();

    let bundle = vault.export_all().await.unwrap();

    assert_eq!(bundle.credential(), credential);
    assert_eq!(bundle.meta.format_version, FORMAT_VERSION);
    assert_eq!(bundle.clients.len(), 1);
    assert_eq!(bundle.clients[0].key, "20240101-01");
}

#[tokio::test]
async fn export_skips_sessions_without_id() {
    let vault = memory_vault();
    seed(&vault).await;
    let records = vault.load_all().await.unwrap();
    let mut sessions = records.sessions.clone();
    sessions.push(session("20240101-01", 9));

    let bundle = vault
        .export_bundle(&records.clients, &sessions)
        .await
        .unwrap();
    assert_eq!(bundle.sessions.len(), 2);
}

#[tokio::test]
async fn export_requires_unlock() {
    let vault = memory_vault();
    seed(&vault).await;
    vault.lock();
    assert!(matches!(
        vault.export_bundle(&[], &[]).await,
        Err(VaultError::Locked)
    ));
}

#[tokio::test]
async fn bundle_json_contains_no_plaintext() {
    let vault = memory_vault();
    vault.setup(PASSWORD).await.unwrap();
    let mut c = client("20240101-01", "Quintessa Marblethorpe");
    c.notes = "very-recognizable-note".into();
    vault.save_client(&c).await.unwrap();

    let json = vault.export_all().await.unwrap().to_json_pretty().unwrap();

    assert!(json.contains("20240101-01"));
    assert!(!json.contains("Quintessa"));
    assert!(!json.contains("very-recognizable-note"));
}

#[tokio::test]
async fn import_into_other_vault_with_bundle_password() {
    let source = memory_vault();
    seed(&source).await;
    let expected = source.load_all().await.unwrap();
    let bundle = source.export_all().await.unwrap();

    let (dest, _dir, path) = disk_vault().await;
    dest.setup("beta-password").await.unwrap();
    dest.save_client(&client("20230505-01", "Other")).await.unwrap();
    let before = snapshot(&path);

    let err = dest
        .import_bundle(&bundle, "beta-password")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Authentication));
    assert_eq!(snapshot(&path), before);

    dest.import_bundle(&bundle, PASSWORD).await.unwrap();
    assert_eq!(dest.load_all().await.unwrap(), expected);

    dest.lock();
    assert!(matches!(
        dest.unlock("beta-password").await,
        Err(VaultError::Authentication)
    ));
    dest.unlock(PASSWORD).await.unwrap();
}

#[tokio::test]
async fn import_into_fresh_vault_unlocks_it() {
    let source = memory_vault();
    seed(&source).await;
    let bundle = source.export_all().await.unwrap();

    let dest = memory_vault();
    assert_eq!(dest.status().await.unwrap(), VaultStatus::NeedsSetup);

    dest.import_bundle(&bundle, PASSWORD).await.unwrap();

    assert_eq!(dest.status().await.unwrap(), VaultStatus::Unlocked);
    assert_eq!(dest.list_sessions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn import_into_locked_vault() {
    let source = memory_vault();
    seed(&source).await;
    let bundle = source.export_all().await.unwrap();

    let dest = memory_vault();
    dest.setup("beta-password").await.unwrap();
    dest.lock();

    dest.import_bundle(&bundle, PASSWORD).await.unwrap();
    assert!(dest.is_unlocked());
}

#[tokio::test]
async fn import_preserves_session_keys() {
    let source = memory_vault();
    let (_, ids) = seed(&source).await;
    let bundle = source.export_all().await.unwrap();

    let dest = memory_vault();
    dest.import_bundle(&bundle, PASSWORD).await.unwrap();

    let imported: Vec<_> = dest
        .list_sessions()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|s| s.id)
        .collect();
    assert_eq!(imported, ids);
}

// ── Parsing ──────────────────────────────────────────────────────

#[tokio::test]
async fn file_roundtrip() {
    let vault = memory_vault();
    seed(&vault).await;
    let bundle = vault.export_all().await.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");
    bundle.write_to(&path).await.unwrap();
    let read = BackupBundle::read_from(&path).await.unwrap();

    assert_eq!(read, bundle);
}

async fn bundle_value() -> serde_json::Value {
    let vault = memory_vault();
    seed(&vault).await;
    let json = vault.export_all().await.unwrap().to_json_pretty().unwrap();
    serde_json::from_str(&json).unwrap()
}

fn parse(value: &serde_json::Value) -> Result<BackupBundle, VaultError> {
    BackupBundle::from_json_slice(&serde_json::to_vec(value).unwrap())
}

#[tokio::test]
async fn unknown_format_version_is_reported() {
    let mut value = bundle_value().await;
    value["meta"]["format_version"] = serde_json::json!(2);
    // Even with an otherwise unreadable body.
    value["clients"] = serde_json::json!("garbage");

    assert!(matches!(
        parse(&value),
        Err(VaultError::UnsupportedFormatVersion(2))
    ));
}

#[tokio::test]
async fn malformed_bundles_are_validation_errors() {
    let value = bundle_value().await;

    let mut missing_meta = value.clone();
    missing_meta.as_object_mut().unwrap().remove("meta");

    let mut clients_not_array = value.clone();
    clients_not_array["clients"] = serde_json::json!({});

    let mut short_salt = value.clone();
    short_salt["meta"]["salt"] = serde_json::json!("AAAA");

    let mut missing_verifier = value.clone();
    missing_verifier["meta"]
        .as_object_mut()
        .unwrap()
        .remove("verifier");

    let mut short_nonce = value.clone();
    short_nonce["sessions"][0]["nonce"] = serde_json::json!("AAAA");

    let mut duplicate_session = value.clone();
    let first = duplicate_session["sessions"][0].clone();
    duplicate_session["sessions"]
        .as_array_mut()
        .unwrap()
        .push(first);

    let mut missing_version = value.clone();
    missing_version["meta"]
        .as_object_mut()
        .unwrap()
        .remove("format_version");

    let mut huge_kdf = value.clone();
    huge_kdf["meta"]["kdf_iterations"] = serde_json::json!(u32::MAX);

    for (name, bad) in [
        ("huge kdf_iterations", huge_kdf),
        ("missing meta", missing_meta),
        ("clients not array", clients_not_array),
        ("short salt", short_salt),
        ("missing verifier", missing_verifier),
        ("short nonce", short_nonce),
        ("duplicate session", duplicate_session),
        ("missing version", missing_version),
    ] {
        assert!(
            matches!(parse(&bad), Err(VaultError::Validation(_))),
            "{name} was not rejected as invalid"
        );
    }

    assert!(matches!(
        BackupBundle::from_json_slice(b"not json"),
        Err(VaultError::Validation(_))
    ));
}

#[tokio::test]
async fn rejected_import_leaves_destination_unchanged() {
    let source = memory_vault();
    seed(&source).await;
    let mut bundle = source.export_all().await.unwrap();
    bundle.meta.format_version = 7;

    let (dest, _dir, path) = disk_vault().await;
    seed(&dest).await;
    let before = snapshot(&path);

    assert!(matches!(
        dest.import_bundle(&bundle, PASSWORD).await,
        Err(VaultError::UnsupportedFormatVersion(7))
    ));
    assert_eq!(snapshot(&path), before);
}
