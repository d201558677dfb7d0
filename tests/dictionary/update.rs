//! Update protocol tests.

use crate::common::*;
use keyspan::prelude::*;

#[tokio::test]
async fn test_update_return_modes() {
    let db = create_test_db();
    let dict = db.dictionary("updates", UpdateMode::Allow).unwrap();
    dict.put(b"k".to_vec(), b"1".to_vec(), ResultType::Void).await.unwrap();

    let old = dict
        .update(b"k".to_vec(), |_| Some(b"2".to_vec()), UpdateReturnMode::OldValue, false)
        .await
        .unwrap();
    assert_eq!(old, Some(b"1".to_vec()));

    let new = dict
        .update(b"k".to_vec(), |_| Some(b"3".to_vec()), UpdateReturnMode::NewValue, true)
        .await
        .unwrap();
    assert_eq!(new, Some(b"3".to_vec()));
}

#[tokio::test]
async fn test_update_returning_none_deletes() {
    let db = create_test_db();
    let dict = db.dictionary("updates", UpdateMode::Allow).unwrap();
    dict.put(b"k".to_vec(), b"v".to_vec(), ResultType::Void).await.unwrap();

    let delta = dict.update_and_get_delta(b"k".to_vec(), |_| None, false).await.unwrap();
    assert_eq!(delta.previous, Some(b"v".to_vec()));
    assert_eq!(delta.current, None);
    assert!(delta.is_modified());
    assert!(!dict.contains_key(None, b"k".to_vec()).await.unwrap());
}

#[tokio::test]
async fn test_update_identity_is_noop() {
    let db = create_test_db();
    let dict = db.dictionary("updates", UpdateMode::Allow).unwrap();
    dict.put(b"k".to_vec(), b"v".to_vec(), ResultType::Void).await.unwrap();
    let snapshot = db.take_snapshot().await.unwrap();

    let delta = dict
        .update_and_get_delta(b"k".to_vec(), |old| old.map(<[u8]>::to_vec), false)
        .await
        .unwrap();
    assert!(!delta.is_modified());
    assert_eq!(delta.into_current(), Some(b"v".to_vec()));
    db.release_snapshot(snapshot).await.unwrap();
}

#[tokio::test]
async fn test_update_disallowed() {
    let db = create_test_db();
    let dict = db.dictionary("frozen", UpdateMode::Disallow).unwrap();
    dict.put(b"k".to_vec(), b"v".to_vec(), ResultType::Void).await.unwrap();
    let err = dict
        .update(b"k".to_vec(), |_| Some(Vec::new()), UpdateReturnMode::Nothing, false)
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
    // Refused before any write.
    assert_eq!(dict.get(None, b"k".to_vec(), false).await.unwrap(), Some(b"v".to_vec()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_updates() {
    let db = create_test_db();
    let dict = db.dictionary("counter", UpdateMode::Allow).unwrap();
    let tasks = 8;
    let increments = 50;

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let dict = dict.clone();
            tokio::spawn(async move {
                for _ in 0..increments {
                    dict.update(
                        b"counter".to_vec(),
                        |old| {
                            let n = old.map_or(0u64, |v| u64::from_be_bytes(v.try_into().unwrap()));
                            Some((n + 1).to_be_bytes().to_vec())
                        },
                        UpdateReturnMode::Nothing,
                        false,
                    )
                    .await
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let value = dict.get(None, b"counter".to_vec(), true).await.unwrap().unwrap();
    assert_eq!(u64::from_be_bytes(value.try_into().unwrap()), (tasks * increments) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_updates_and_puts_interleave() {
    let db = create_test_db();
    let dict = db.dictionary("mixed", UpdateMode::Allow).unwrap();
    fill(&dict, 16).await;

    let updater = {
        let dict = dict.clone();
        tokio::spawn(async move {
            for round in 0..20u32 {
                let k = key(round % 16);
                dict.update(k, |old| old.map(|v| vec![v[0].wrapping_add(1)]), UpdateReturnMode::Nothing, true)
                    .await
                    .unwrap();
            }
        })
    };
    let writer = {
        let dict = dict.clone();
        tokio::spawn(async move {
            for i in 16..48 {
                dict.put(key(i), vec![0], ResultType::Void).await.unwrap();
            }
        })
    };
    updater.await.unwrap();
    writer.await.unwrap();
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 48);
}
