use super::*;
use serde_json::json;

#[test]
fn set_then_get_round_trips() {
    let store = InMemoryKeyValueStore::default();
    store.set("credential_c1", json!({"user": "alice"})).unwrap();
    assert_eq!(
        store.get("credential_c1").unwrap(),
        Some(json!({"user": "alice"}))
    );
}

#[test]
fn missing_key_is_none() {
    let store = InMemoryKeyValueStore::default();
    assert_eq!(store.get("nope").unwrap(), None);
}

#[test]
fn delete_removes_key() {
    let store = InMemoryKeyValueStore::default();
    store.set("k", json!(1)).unwrap();
    store.delete("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
}

#[test]
fn file_store_opens_empty_when_no_snapshot_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileKeyValueStore::open(dir.path().join("kv.json")).unwrap();
    assert_eq!(store.get("anything").unwrap(), None);
}

#[test]
fn file_store_round_trips_set_get_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileKeyValueStore::open(dir.path().join("kv.json")).unwrap();
    store
        .set("credential_c1", json!({"user": "alice"}))
        .unwrap();
    assert_eq!(
        store.get("credential_c1").unwrap(),
        Some(json!({"user": "alice"}))
    );
    store.delete("credential_c1").unwrap();
    assert_eq!(store.get("credential_c1").unwrap(), None);
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.json");
    {
        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("globus_task_t1", json!("label")).unwrap();
    }
    let reopened = FileKeyValueStore::open(&path).unwrap();
    assert_eq!(
        reopened.get("globus_task_t1").unwrap(),
        Some(json!("label"))
    );
}
