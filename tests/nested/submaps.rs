//! SubMap behaviour over a shared dictionary.

use crate::common::*;
use futures::stream;
use keyspan::prelude::*;

fn tenant(id: u8) -> Vec<u8> {
    vec![0, 0, 0, id]
}

#[tokio::test]
async fn test_tenants_do_not_leak() {
    let db = create_test_db();
    let layout = KeyLayout::new(4, 2, 0);
    let a = db.nested_map("tenants", tenant(1), layout).unwrap();
    let b = db.nested_map("tenants", tenant(2), layout).unwrap();
    let last = db.nested_map("tenants", vec![0xFF; 4], layout).unwrap();

    for i in 0..5u8 {
        a.put(&[0, i], vec![i], ResultType::Void).await.unwrap();
        last.put(&[0xFF, i], vec![i], ResultType::Void).await.unwrap();
    }
    b.put(&[0, 0], b"b".to_vec(), ResultType::Void).await.unwrap();

    assert_eq!(a.size(None, false).await.unwrap(), 5);
    assert_eq!(last.size(None, false).await.unwrap(), 5);
    assert_eq!(b.get(None, &[0, 0]).await.unwrap(), Some(b"b".to_vec()));

    let keys = collect_ok(last.keys(None)).await;
    assert_eq!(keys.first(), Some(&vec![0xFF, 0]));

    a.clear().await.unwrap();
    assert!(a.is_empty(None).await.unwrap());
    assert!(!b.is_empty(None).await.unwrap());
    assert!(!last.is_empty(None).await.unwrap());
}

#[tokio::test]
async fn test_snapshot_reads_through_submap() {
    let db = create_test_db();
    let map = db.nested_map("snap", vec![9], KeyLayout::new(1, 1, 0)).unwrap();
    map.put(&[1], b"old".to_vec(), ResultType::Void).await.unwrap();
    let snapshot = db.take_snapshot().await.unwrap();
    map.put(&[1], b"new".to_vec(), ResultType::Void).await.unwrap();

    assert_eq!(map.get(Some(snapshot), &[1]).await.unwrap(), Some(b"old".to_vec()));
    let entries = collect_ok(map.entries(Some(snapshot))).await;
    assert_eq!(entries, vec![(vec![1], b"old".to_vec())]);
    db.release_snapshot(snapshot).await.unwrap();
}

#[tokio::test]
async fn test_three_levels() {
    let db = create_test_db();
    let dict = db.dictionary("tree", UpdateMode::Allow).unwrap();
    let root = SubMap::root(dict, 1, 2).unwrap();
    for (a, b, c) in [(1u8, 1u8, 1u8), (1, 1, 2), (1, 2, 1), (2, 1, 1)] {
        let level1 = root.child(&[a], 1).unwrap();
        let level2 = level1.child(&[b], 1).unwrap();
        level2.put(&[c], vec![a, b, c], ResultType::Void).await.unwrap();
    }

    assert_eq!(collect_ok(root.child_keys(None)).await, vec![vec![1], vec![2]]);
    let one = root.child(&[1], 1).unwrap();
    assert_eq!(collect_ok(one.child_keys(None)).await, vec![vec![1], vec![2]]);
    let one_one = one.child(&[1], 1).unwrap();
    assert_eq!(collect_ok(one_one.keys(None)).await, vec![vec![1], vec![2]]);
    assert!(one_one.child(&[1], 1).is_err());

    one.set_all(stream::iter(vec![(vec![3, 3], vec![0])])).await.unwrap();
    assert_eq!(root.size(None, false).await.unwrap(), 2);
    assert_eq!(collect_ok(one.child_keys(None)).await, vec![vec![3]]);
}

#[tokio::test]
async fn test_submap_update_counter() {
    let db = create_test_db();
    let map = db.nested_map("counters", vec![1, 2], KeyLayout::new(2, 1, 0)).unwrap();
    for _ in 0..3 {
        map.update(&[0], |old| Some(vec![old.map_or(0, |v| v[0]) + 1]), UpdateReturnMode::Nothing)
            .await
            .unwrap();
    }
    assert_eq!(map.get(None, &[0]).await.unwrap(), Some(vec![3]));
    assert!(map.contains(None, &[0]).await.unwrap());
    assert_eq!(map.remove(&[0], ResultType::PreviousValueExistence).await.unwrap(), Some(vec![1]));
}
