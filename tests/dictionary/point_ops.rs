//! Point operation tests: round-trip and the previous-value contract.

use crate::common::*;
use keyspan::prelude::*;

#[tokio::test]
async fn test_put_get_round_trip() {
    let db = create_test_db();
    let dict = db.dictionary("points", UpdateMode::Allow).unwrap();
    dict.put(b"key".to_vec(), b"value".to_vec(), ResultType::Void).await.unwrap();
    assert_eq!(dict.get(None, b"key".to_vec(), false).await.unwrap(), Some(b"value".to_vec()));
    assert_eq!(dict.get(None, b"key".to_vec(), true).await.unwrap(), Some(b"value".to_vec()));
    assert_eq!(dict.get(None, b"other".to_vec(), false).await.unwrap(), None);
}

#[tokio::test]
async fn test_empty_key_and_value() {
    let db = create_test_db();
    let dict = db.dictionary("points", UpdateMode::Disallow).unwrap();
    dict.put(Vec::new(), Vec::new(), ResultType::Void).await.unwrap();
    assert_eq!(dict.get(None, Vec::new(), false).await.unwrap(), Some(Vec::new()));
    assert!(dict.contains_key(None, Vec::new()).await.unwrap());
}

#[tokio::test]
async fn test_previous_value_contract() {
    let db = create_test_db();
    let dict = db.dictionary("points", UpdateMode::Allow).unwrap();

    let previous = dict.put(b"k".to_vec(), b"v1".to_vec(), ResultType::PreviousValue).await.unwrap();
    assert_eq!(previous, None);
    let previous = dict.put(b"k".to_vec(), b"v2".to_vec(), ResultType::PreviousValue).await.unwrap();
    assert_eq!(previous, Some(b"v1".to_vec()));

    let existed = dict.remove(b"k".to_vec(), ResultType::PreviousValueExistence).await.unwrap();
    assert_eq!(existed, Some(vec![1]));
    let existed = dict.remove(b"k".to_vec(), ResultType::PreviousValueExistence).await.unwrap();
    assert_eq!(existed, Some(vec![0]));
    assert_eq!(dict.remove(b"k".to_vec(), ResultType::Void).await.unwrap(), None);
}

#[tokio::test]
async fn test_dictionaries_are_disjoint() {
    let db = create_test_db();
    let a = db.dictionary("a", UpdateMode::Allow).unwrap();
    let b = db.dictionary("b", UpdateMode::Allow).unwrap();
    a.put(b"k".to_vec(), b"a".to_vec(), ResultType::Void).await.unwrap();
    assert_eq!(b.get(None, b"k".to_vec(), false).await.unwrap(), None);
    assert_eq!(a.database_name(), "integration");
}

#[tokio::test]
async fn test_large_value() {
    let db = create_test_db();
    let dict = db.dictionary("points", UpdateMode::Allow).unwrap();
    let value = vec![0xAB; 1 << 20];
    dict.put(b"big".to_vec(), value.clone(), ResultType::Void).await.unwrap();
    assert_eq!(dict.get(None, b"big".to_vec(), true).await.unwrap(), Some(value));
}

#[tokio::test]
async fn test_closed_database_fails() {
    let db = create_test_db();
    let dict = db.dictionary("points", UpdateMode::Allow).unwrap();
    db.close().unwrap();
    let err = dict.put(b"k".to_vec(), b"v".to_vec(), ResultType::Void).await.unwrap_err();
    assert!(matches!(err, keyspan::StoreError::Closed));
    let err = db.dictionary("again", UpdateMode::Allow).unwrap_err();
    assert!(err.is_closed());
}
