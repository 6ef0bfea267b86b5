//! Tests for RecordStore

use super::*;
use crate::database::Database;
use crate::types::CollectionTarget;
use pretty_assertions::assert_eq;
use serde_json::json;

fn target(id: &str) -> CollectionTarget {
    CollectionTarget::new(id).unwrap()
}

fn record(id: &str) -> Record {
    Record::from_json(
        &json!({"id": id, "username": format!("user_{id}"), "name": id}),
        DEFAULT_PROFILE_BASE,
    )
    .unwrap()
}

fn store() -> RecordStore {
    RecordStore::new(Database::open_in_memory().unwrap())
}

fn ids(store: &RecordStore, t: &CollectionTarget) -> Vec<String> {
    store
        .list_ordered(t)
        .map(|r| r.unwrap().record_id)
        .collect()
}

// ============================================================================
// Ingestion Tests
// ============================================================================

#[test]
fn test_insert_and_count() {
    let store = store();
    let t = target("42");

    let inserted = store.insert_many(&t, &[record("a"), record("b")]).unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(store.count(&t).unwrap(), 2);
    assert!(store.contains(&t, "a").unwrap());
    assert!(!store.contains(&t, "z").unwrap());
}

#[test]
fn test_duplicate_insert_is_noop() {
    let store = store();
    let t = target("42");
    store.insert_many(&t, &[record("a")]).unwrap();
    let before: Vec<Record> = store.list_ordered(&t).map(Result::unwrap).collect();

    let mut changed = record("a");
    changed.name = Some("Changed".to_string());
    let inserted = store.insert_many(&t, &[changed]).unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(store.count(&t).unwrap(), 1);
    let after: Vec<Record> = store.list_ordered(&t).map(Result::unwrap).collect();
    assert_eq!(before, after);
}

#[test]
fn test_duplicates_within_batch() {
    let store = store();
    let t = target("42");
    let inserted = store
        .insert_many(&t, &[record("a"), record("a"), record("b")])
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(store.count(&t).unwrap(), 2);
}

#[test]
fn test_same_id_different_targets() {
    let store = store();
    store.insert_many(&target("1"), &[record("a")]).unwrap();
    store.insert_many(&target("2"), &[record("a")]).unwrap();

    assert_eq!(store.count(&target("1")).unwrap(), 1);
    assert_eq!(store.count(&target("2")).unwrap(), 1);
}

#[test]
fn test_empty_insert() {
    let store = store();
    assert_eq!(store.insert_many(&target("42"), &[]).unwrap(), 0);
    assert_eq!(store.count(&target("42")).unwrap(), 0);
}

// ============================================================================
// Ordered Listing Tests
// ============================================================================

#[test]
fn test_list_ordered_by_record_id() {
    let store = store();
    let t = target("42");
    store
        .insert_many(&t, &[record("c"), record("a"), record("b")])
        .unwrap();

    assert_eq!(ids(&store, &t), vec!["a", "b", "c"]);
}

#[test]
fn test_list_ordered_across_batches() {
    let store = store().with_list_batch(2);
    let t = target("42");
    let records: Vec<Record> = ["e", "d", "c", "b", "a"].iter().map(|id| record(id)).collect();
    store.insert_many(&t, &records).unwrap();

    assert_eq!(ids(&store, &t), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_list_ordered_exact_batch_multiple() {
    let store = store().with_list_batch(2);
    let t = target("42");
    store
        .insert_many(&t, &[record("a"), record("b"), record("c"), record("d")])
        .unwrap();

    assert_eq!(ids(&store, &t).len(), 4);
}

#[test]
fn test_list_ordered_is_restartable() {
    let store = store();
    let t = target("42");
    store.insert_many(&t, &[record("b"), record("a")]).unwrap();

    let mut first_pass = store.list_ordered(&t);
    assert_eq!(first_pass.next().unwrap().unwrap().record_id, "a");

    assert_eq!(ids(&store, &t), vec!["a", "b"]);
    assert_eq!(first_pass.next().unwrap().unwrap().record_id, "b");
    assert!(first_pass.next().is_none());
}

#[test]
fn test_list_ordered_only_target_rows() {
    let store = store();
    store.insert_many(&target("1"), &[record("x")]).unwrap();
    store.insert_many(&target("2"), &[record("y")]).unwrap();

    assert_eq!(ids(&store, &target("1")), vec!["x"]);
    assert!(ids(&store, &target("3")).is_empty());
}

#[test]
fn test_round_trip_preserves_fields() {
    let store = store();
    let t = target("42");
    let original = Record::from_json(
        &json!({
            "id": "9",
            "username": "nine",
            "name": "Nine, \"the\" number",
            "verified": true,
            "created_at": "2021-05-05T00:00:00.000Z",
            "description": "multi\nline",
            "public_metrics": {"tweet_count": 5}
        }),
        DEFAULT_PROFILE_BASE,
    )
    .unwrap();
    store.insert_many(&t, &[original.clone()]).unwrap();

    let stored = store.list_ordered(&t).next().unwrap().unwrap();
    assert_eq!(stored, original);
}
