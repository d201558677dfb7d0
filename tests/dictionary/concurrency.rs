//! Concurrent access tests.

use crate::common::*;
use futures::stream;
use keyspan::prelude::*;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_writers() {
    let db = create_test_db();
    let dict = db.dictionary("writers", UpdateMode::Allow).unwrap();
    let writers = 8u32;
    let per_writer = 40u32;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let dict = dict.clone();
            tokio::spawn(async move {
                for i in 0..per_writer {
                    dict.put(key(w * 1000 + i), vec![w as u8], ResultType::Void).await.unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(
        dict.size_range(None, KeyRange::all(), false).await.unwrap(),
        u64::from(writers * per_writer)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_randomized_workload_matches_model() {
    let db = create_test_db();
    let dict = db.dictionary("model", UpdateMode::Allow).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

    for _ in 0..300 {
        let k = key(rng.gen_range(0..32));
        match rng.gen_range(0..4) {
            0 | 1 => {
                let v = vec![rng.gen::<u8>()];
                let previous = dict.put(k.clone(), v.clone(), ResultType::PreviousValue).await.unwrap();
                assert_eq!(previous, model.insert(k, v));
            }
            2 => {
                let previous = dict.remove(k.clone(), ResultType::PreviousValue).await.unwrap();
                assert_eq!(previous, model.remove(&k));
            }
            _ => {
                let delta = dict
                    .update_and_get_delta(k.clone(), |old| old.map(|v| vec![v[0].wrapping_mul(3)]), false)
                    .await
                    .unwrap();
                assert_eq!(delta.previous.as_ref(), model.get(&k));
                if let Some(current) = delta.current {
                    model.insert(k, current);
                }
            }
        }
    }

    let stored = collect_ok(dict.get_range(None, KeyRange::all())).await;
    let expected: Vec<_> = model.into_iter().collect();
    assert_eq!(stored, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_during_put_multi() {
    let db = create_test_db();
    let dict = db.dictionary("windows", UpdateMode::Allow).unwrap();
    let entries: Vec<_> = (0..200).map(|i| (key(i), vec![1u8])).collect();

    let writer = {
        let dict = dict.clone();
        tokio::spawn(async move { collect_ok(dict.put_multi(stream::iter(entries), false)).await })
    };
    let reader = {
        let dict = dict.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                if let Some(value) = dict.get(None, key(i), false).await.unwrap() {
                    assert_eq!(value, vec![1u8]);
                }
            }
        })
    };
    assert_eq!(writer.await.unwrap().len(), 200);
    reader.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remove_one_hands_each_key_to_one_caller() {
    let db = create_test_db();
    let dict = db.dictionary("queue", UpdateMode::Allow).unwrap();
    fill(&dict, 60).await;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let dict = dict.clone();
            tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some((k, _)) = dict.remove_one(KeyRange::all()).await.unwrap() {
                    taken.push(key_index(&k));
                }
                taken
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (0..60).collect::<Vec<_>>());
}
