//! Range key arithmetic through the public API.

use keyspan::{first_range_key, next_range_key, KeyLayout, KeyRange};
use proptest::prelude::*;

#[test]
fn test_reference_vectors() {
    let prefix = [0x00, 0x00, 0xFF];
    let mut expected_first = prefix.to_vec();
    expected_first.extend_from_slice(&[0u8; 10]);
    assert_eq!(first_range_key(&prefix, 7, 3), expected_first);

    let mut expected_next = vec![0x00, 0x01, 0x00];
    expected_next.extend_from_slice(&[0u8; 10]);
    assert_eq!(next_range_key(&prefix, 7, 3), expected_next);

    let saturated = [0xFF, 0xFF, 0xFF];
    let mut sentinel = vec![0xFF; 13];
    sentinel.push(0x00);
    assert_eq!(next_range_key(&saturated, 7, 3), sentinel);
}

#[test]
fn test_layout_range_matches_free_functions() {
    let layout = KeyLayout::new(3, 7, 3);
    let prefix = [0x12, 0x34, 0x56];
    let range = layout.range(&prefix).unwrap();
    assert_eq!(range.min(), Some(first_range_key(&prefix, 7, 3).as_slice()));
    assert_eq!(range.max(), Some(next_range_key(&prefix, 7, 3).as_slice()));
    assert!(layout.range(&[1, 2]).is_err());
}

#[test]
fn test_suffix_ranges_nest_inside_prefix_range() {
    let layout = KeyLayout::new(2, 2, 2);
    let outer = layout.range(&[0xAB, 0xFF]).unwrap();
    let inner = layout.range_with_suffix(&[0xAB, 0xFF], &[0xFF, 0xFF]).unwrap();
    assert!(outer.contains(inner.min().unwrap()));
    assert_eq!(inner.max(), outer.max());
}

fn full_key(prefix: &[u8], tail: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(tail);
    key
}

proptest! {
    #[test]
    fn prop_prefix_range_is_exact(
        prefix in proptest::collection::vec(any::<u8>(), 2),
        other in proptest::collection::vec(any::<u8>(), 2),
        tail in proptest::collection::vec(any::<u8>(), 3),
    ) {
        let layout = KeyLayout::new(2, 2, 1);
        let range: KeyRange = layout.range(&prefix).unwrap();
        prop_assert!(range.contains(&full_key(&prefix, &tail)));
        prop_assert_eq!(range.contains(&full_key(&other, &tail)), other == prefix);
    }
}
