//! Multi-key window tests.

use crate::common::*;
use futures::stream;
use keyspan::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[tokio::test]
async fn test_get_multi_matches_point_reads() {
    let db = create_test_db();
    let dict = db.dictionary("multi", UpdateMode::Allow).unwrap();
    fill(&dict, 30).await;

    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut keys: Vec<_> = (0..60).map(key).collect();
    keys.shuffle(&mut rng);

    let results = collect_ok(dict.get_multi(None, stream::iter(keys.clone()), false)).await;
    assert_eq!(results.len(), keys.len());
    for ((k, value), expected_key) in results.into_iter().zip(keys) {
        assert_eq!(k, expected_key);
        let i = key_index(&k);
        let expected = (i < 30).then(|| vec![i as u8]);
        assert_eq!(value, expected);
    }
}

#[tokio::test]
async fn test_put_multi_reports_old_values_in_order() {
    let db = create_test_db();
    let dict = db.dictionary("multi", UpdateMode::Disallow).unwrap();
    fill(&dict, 5).await;

    let entries: Vec<_> = (3..9).map(|i| (key(i), vec![100 + i as u8])).collect();
    let previous = collect_ok(dict.put_multi(stream::iter(entries), true)).await;
    assert_eq!(previous, vec![Some(vec![3]), Some(vec![4]), None, None, None, None]);
    assert_eq!(dict.get(None, key(8), false).await.unwrap(), Some(vec![108]));
}

#[tokio::test]
async fn test_put_multi_without_old_values() {
    let db = create_test_db();
    let dict = db.dictionary("multi", UpdateMode::Allow).unwrap();
    let entries: Vec<_> = (0..25).map(|i| (key(i), vec![0u8; 40])).collect();
    let results = collect_ok(dict.put_multi(stream::iter(entries), false)).await;
    assert_eq!(results.len(), 25);
    assert!(results.iter().all(Option::is_none));
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 25);
}

#[tokio::test]
async fn test_get_multi_unknown_snapshot_fails() {
    let db = create_test_db();
    let dict = db.dictionary("multi", UpdateMode::Allow).unwrap();
    let snapshot = db.take_snapshot().await.unwrap();
    db.release_snapshot(snapshot).await.unwrap();

    let results: Vec<_> = dict
        .get_multi(Some(snapshot), stream::iter(vec![key(1)]), false)
        .collect()
        .await;
    assert!(matches!(results[0], Err(keyspan::StoreError::SnapshotNotFound(_))));
}
