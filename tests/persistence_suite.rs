mod common;

use std::fs;

use tempfile::tempdir;

use common::{planned_period, store_with_client};
use fieldwork_core::core::services::{DocumentService, PeriodService, SignoffService, ToggleSignoff};
use fieldwork_core::core::templates::standard_registry;
use fieldwork_core::domain::SignoffKind;
use fieldwork_core::storage::memory::MemoryStore;
use fieldwork_core::storage::snapshot::{
    load_snapshot_from_path, save_snapshot_to_path, SNAPSHOT_SCHEMA_VERSION,
};
use fieldwork_core::storage::StorageBackend;

#[test]
fn snapshot_roundtrip_preserves_periods_documents_and_signoffs() {
    let (store, client) = store_with_client();
    let period = planned_period(&store, client.id, "FY25", 2025);
    PeriodService::promote_to_open(&store, client.id, period.id).unwrap();
    DocumentService::ensure(&store, standard_registry(), client.id, period.id, "ACC-2").unwrap();
    DocumentService::record_amount(&store, client.id, period.id, "ACC-2", "rent", Some(750.0))
        .unwrap();
    SignoffService::toggle(
        &store,
        ToggleSignoff {
            client_id: client.id,
            period_id: period.id,
            code: "ACC-2".into(),
            kind: SignoffKind::Reviewed,
            checked: true,
            member_id: Some("member-7".into()),
        },
    )
    .unwrap();

    let temp = tempdir().unwrap();
    let path = temp.path().join("engagement.json");
    save_snapshot_to_path(&store.snapshot(), &path).expect("save snapshot");

    let restored = MemoryStore::from_snapshot(load_snapshot_from_path(&path).expect("load"));
    let restored_period = restored.period(period.id).unwrap().expect("period kept");
    assert!(restored_period.is_current);
    let document = restored.document(period.id, "ACC-2").unwrap().expect("doc kept");
    assert_eq!(document.client_id, client.id);
    let signoff = restored
        .signoff(client.id, period.id, "ACC-2")
        .unwrap()
        .expect("signoff kept");
    assert_eq!(signoff.reviewed_by_member_id.as_deref(), Some("member-7"));
    assert_eq!(signoff.history.len(), 1);
}

#[test]
fn snapshots_from_a_newer_schema_are_rejected() {
    let (store, _client) = store_with_client();
    let temp = tempdir().unwrap();
    let path = temp.path().join("future.json");
    save_snapshot_to_path(&store.snapshot(), &path).unwrap();

    let mut raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    raw["schema_version"] = serde_json::json!(SNAPSHOT_SCHEMA_VERSION + 5);
    fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

    let err = load_snapshot_from_path(&path).expect_err("future schema must be rejected");
    assert!(
        err.to_string().contains("newer"),
        "unexpected error: {err}"
    );
}

#[test]
fn failed_atomic_save_preserves_the_original_file() {
    let (store, client) = store_with_client();
    planned_period(&store, client.id, "FY25", 2025);

    let temp = tempdir().unwrap();
    let path = temp.path().join("engagement.json");
    save_snapshot_to_path(&store.snapshot(), &path).unwrap();
    let original = fs::read_to_string(&path).unwrap();

    // Collide with the staging file name to force the write to fail.
    fs::create_dir_all(path.with_extension("tmp")).unwrap();
    planned_period(&store, client.id, "FY26", 2026);
    let result = save_snapshot_to_path(&store.snapshot(), &path);
    assert!(result.is_err(), "save must fail when the staging path is taken");

    let after = fs::read_to_string(&path).unwrap();
    assert_eq!(original, after);
}
