//! Snapshot isolation tests.

use crate::common::*;
use futures::stream;
use keyspan::prelude::*;

#[tokio::test]
async fn test_snapshot_sees_frozen_state() {
    let db = create_test_db();
    let dict = db.dictionary("snap", UpdateMode::Allow).unwrap();
    fill(&dict, 10).await;

    let snapshot = db.take_snapshot().await.unwrap();
    dict.put(key(0), b"changed".to_vec(), ResultType::Void).await.unwrap();
    dict.remove(key(1), ResultType::Void).await.unwrap();
    dict.put(key(99), vec![99], ResultType::Void).await.unwrap();

    assert_eq!(dict.get(Some(snapshot), key(0), false).await.unwrap(), Some(vec![0]));
    assert_eq!(dict.get(Some(snapshot), key(1), false).await.unwrap(), Some(vec![1]));
    assert_eq!(dict.get(Some(snapshot), key(99), false).await.unwrap(), None);

    let frozen = collect_ok(dict.get_range_keys(Some(snapshot), KeyRange::all())).await;
    assert_eq!(frozen, (0..10).map(key).collect::<Vec<_>>());
    assert_eq!(dict.size_range(Some(snapshot), KeyRange::all(), false).await.unwrap(), 10);

    let latest = collect_ok(dict.get_range_keys(None, KeyRange::all())).await;
    assert_eq!(latest.len(), 10);
    assert!(!latest.contains(&key(1)));

    db.release_snapshot(snapshot).await.unwrap();
}

#[tokio::test]
async fn test_snapshot_spans_dictionaries() {
    let db = create_test_db();
    let a = db.dictionary("a", UpdateMode::Allow).unwrap();
    let b = db.dictionary("b", UpdateMode::Disallow).unwrap();
    a.put(b"k".to_vec(), b"a0".to_vec(), ResultType::Void).await.unwrap();
    let snapshot = db.take_snapshot().await.unwrap();
    b.put(b"k".to_vec(), b"b1".to_vec(), ResultType::Void).await.unwrap();
    a.put(b"k".to_vec(), b"a1".to_vec(), ResultType::Void).await.unwrap();

    assert_eq!(a.get(Some(snapshot), b"k".to_vec(), false).await.unwrap(), Some(b"a0".to_vec()));
    assert_eq!(b.get(Some(snapshot), b"k".to_vec(), false).await.unwrap(), None);
    db.release_snapshot(snapshot).await.unwrap();
}

#[tokio::test]
async fn test_snapshot_survives_set_range() {
    let db = create_test_db();
    let dict = db.dictionary("snap", UpdateMode::Allow).unwrap();
    fill(&dict, 8).await;
    let snapshot = db.take_snapshot().await.unwrap();
    dict.set_range(KeyRange::all(), stream::iter(vec![(key(100), vec![0])])).await.unwrap();

    let before = collect_ok(dict.get_range_keys(Some(snapshot), KeyRange::all())).await;
    assert_eq!(before.len(), 8);
    let after = collect_ok(dict.get_range_keys(None, KeyRange::all())).await;
    assert_eq!(after, vec![key(100)]);
    db.release_snapshot(snapshot).await.unwrap();
}

#[tokio::test]
async fn test_released_snapshot_is_not_found() {
    let db = create_test_db();
    let dict = db.dictionary("snap", UpdateMode::Allow).unwrap();
    let snapshot = db.take_snapshot().await.unwrap();
    db.release_snapshot(snapshot).await.unwrap();

    let err = db.release_snapshot(snapshot).await.unwrap_err();
    assert!(err.is_not_found());
    let err = dict.get(Some(snapshot), key(0), false).await.unwrap_err();
    assert!(err.is_not_found());
    let items: Vec<_> = dict.get_range(Some(snapshot), KeyRange::all()).collect().await;
    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_not_found());
    assert_eq!(err.to_string(), format!("Snapshot {} not found!", snapshot.id()));
}

#[tokio::test]
async fn test_snapshot_tokens_are_distinct() {
    let db = create_test_db();
    let first = db.take_snapshot().await.unwrap();
    let second = db.take_snapshot().await.unwrap();
    assert_ne!(first, second);
    assert_eq!(db.database().live_snapshots(), 2);
    db.release_snapshot(second).await.unwrap();
    db.release_snapshot(first).await.unwrap();
    assert_eq!(db.database().live_snapshots(), 0);
}
