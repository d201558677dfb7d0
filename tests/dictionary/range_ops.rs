//! Range read/write tests.

use crate::common::*;
use futures::stream;
use keyspan::prelude::*;
use proptest::prelude::*;

#[tokio::test]
async fn test_range_is_half_open() {
    let db = create_test_db();
    let dict = db.dictionary("ranges", UpdateMode::Allow).unwrap();
    fill(&dict, 20).await;

    let range = KeyRange::between(key(5), key(10)).unwrap();
    let keys = collect_ok(dict.get_range_keys(None, range)).await;
    assert_eq!(keys, (5..10).map(key).collect::<Vec<_>>());

    let tail = collect_ok(dict.get_range(None, KeyRange::at_least(key(18)))).await;
    assert_eq!(tail, vec![(key(18), vec![18]), (key(19), vec![19])]);

    let head = collect_ok(dict.get_range_keys(None, KeyRange::below(key(2)))).await;
    assert_eq!(head, vec![key(0), key(1)]);
}

#[tokio::test]
async fn test_set_range_replaces_contents() {
    let db = create_test_db();
    let dict = db.dictionary("ranges", UpdateMode::Allow).unwrap();
    fill(&dict, 20).await;

    let range = KeyRange::between(key(5), key(15)).unwrap();
    let replacement = vec![
        (key(7), b"a".to_vec()),
        (key(12), b"b".to_vec()),
        (key(7), b"c".to_vec()),
    ];
    dict.set_range(range.clone(), stream::iter(replacement)).await.unwrap();

    let inside = collect_ok(dict.get_range(None, range)).await;
    assert_eq!(inside, vec![(key(7), b"c".to_vec()), (key(12), b"b".to_vec())]);
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 12);
    assert_eq!(dict.get(None, key(4), false).await.unwrap(), Some(vec![4]));
    assert_eq!(dict.get(None, key(15), false).await.unwrap(), Some(vec![15]));
}

#[tokio::test]
async fn test_set_range_single_key() {
    let db = create_test_db();
    let dict = db.dictionary("ranges", UpdateMode::Allow).unwrap();
    fill(&dict, 3).await;
    dict.set_range(KeyRange::single(key(1)), stream::iter(Vec::new())).await.unwrap();
    let keys = collect_ok(dict.get_range_keys(None, KeyRange::all())).await;
    assert_eq!(keys, vec![key(0), key(2)]);
}

#[tokio::test]
async fn test_set_range_and_get_previous_streams_removed() {
    let db = create_test_db();
    let dict = db.dictionary("ranges", UpdateMode::Allow).unwrap();
    fill(&dict, 10).await;
    let range = KeyRange::at_least(key(6));
    let removed = collect_ok(dict.set_range_and_get_previous(range.clone(), stream::iter(vec![(key(50), vec![50])]))).await;
    assert_eq!(removed.iter().map(|(k, _)| key_index(k)).collect::<Vec<_>>(), vec![6, 7, 8, 9]);
    let now = collect_ok(dict.get_range_keys(None, range)).await;
    assert_eq!(now, vec![key(50)]);
}

#[tokio::test]
async fn test_grouped_reads() {
    let db = create_test_db();
    let dict = db.dictionary("groups", UpdateMode::Allow).unwrap();
    for (a, b) in [(1u8, 1u8), (1, 2), (2, 1), (3, 1), (3, 2), (3, 3)] {
        dict.put(vec![a, b], vec![a * 10 + b], ResultType::Void).await.unwrap();
    }
    let groups = collect_ok(dict.get_range_keys_grouped(None, KeyRange::all(), 1)).await;
    assert_eq!(groups.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1, 3]);

    let entries = collect_ok(dict.get_range_grouped(None, KeyRange::single(vec![2, 1]), 1)).await;
    assert_eq!(entries, vec![vec![(vec![2, 1], vec![21])]]);

    let prefixes = collect_ok(dict.get_range_key_prefixes(None, KeyRange::at_least(vec![2]), 1)).await;
    assert_eq!(prefixes, vec![vec![2], vec![3]]);
}

#[tokio::test]
async fn test_size_and_emptiness() {
    let db = create_test_db();
    let dict = db.dictionary("sizes", UpdateMode::Allow).unwrap();
    assert!(dict.is_range_empty(None, KeyRange::all()).await.unwrap());
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 0);

    fill(&dict, 100).await;
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 100);
    assert_eq!(dict.size_range(None, KeyRange::all(), true).await.unwrap(), 100);
    let range = KeyRange::between(key(10), key(35)).unwrap();
    assert_eq!(dict.size_range(None, range.clone(), true).await.unwrap(), 25);
    assert!(!dict.is_range_empty(None, range).await.unwrap());
    assert!(dict.is_range_empty(None, KeyRange::at_least(key(100))).await.unwrap());
}

#[tokio::test]
async fn test_get_one_and_remove_one() {
    let db = create_test_db();
    let dict = db.dictionary("queue", UpdateMode::Allow).unwrap();
    fill(&dict, 5).await;

    assert_eq!(dict.get_one(None, KeyRange::at_least(key(2))).await.unwrap(), Some((key(2), vec![2])));
    assert_eq!(dict.get_one_key(None, KeyRange::at_least(key(9))).await.unwrap(), None);

    let removed = dict.remove_one(KeyRange::at_least(key(3))).await.unwrap();
    assert_eq!(removed, Some((key(3), vec![3])));
    let removed = dict.remove_one(KeyRange::at_least(key(3))).await.unwrap();
    assert_eq!(removed, Some((key(4), vec![4])));
    assert_eq!(dict.remove_one(KeyRange::at_least(key(3))).await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_without_native_delete_range() {
    let config = DatabaseConfig {
        native_delete_range: false,
        ..DatabaseConfig::for_testing()
    };
    let db = Keyspan::builder().config(config).open().unwrap();
    let dict = db.dictionary("clear", UpdateMode::Disallow).unwrap();
    fill(&dict, 30).await;
    dict.clear().await.unwrap();
    assert!(dict.is_range_empty(None, KeyRange::all()).await.unwrap());
    fill(&dict, 2).await;
    assert_eq!(dict.size_range(None, KeyRange::all(), false).await.unwrap(), 2);
}

#[tokio::test]
async fn test_dropped_range_stream_stops_producer() {
    let db = create_test_db();
    let dict = db.dictionary("lazy", UpdateMode::Allow).unwrap();
    fill(&dict, 200).await;
    let mut stream = dict.get_range(None, KeyRange::all());
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.0, key(0));
    drop(stream);

    // Scan permits come back once the producer sees the closed channel.
    let scans = db.config().max_concurrent_scans;
    for _ in 0..200 {
        if db.database().pool().available_scans() == scans {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(db.database().pool().available_scans(), scans);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_range_scan_is_exact(
        keys in proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 0..4), 0..40),
        lo in proptest::collection::vec(any::<u8>(), 0..3),
        hi in proptest::collection::vec(any::<u8>(), 0..3),
    ) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = create_test_db();
            let dict = db.dictionary("prop", UpdateMode::Disallow).unwrap();
            for k in &keys {
                dict.put(k.clone(), vec![1], ResultType::Void).await.unwrap();
            }
            let range = KeyRange::between(lo.clone(), hi.clone()).unwrap();
            let scanned = collect_ok(dict.get_range_keys(None, range.clone())).await;
            let expected: Vec<_> = keys.iter().filter(|k| range.contains(k)).cloned().collect();
            assert_eq!(scanned, expected);
            assert_eq!(dict.size_range(None, range, false).await.unwrap(), expected.len() as u64);
        });
    }
}
