//! Shared test utilities for Keyspan integration tests.

#![allow(dead_code)]

use keyspan::prelude::*;
use keyspan::StoreError;

/// Install a test-writer tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

/// Open an in-memory database with tiny windows so boundaries get exercised.
pub fn create_test_db() -> Keyspan {
    init_tracing();
    Keyspan::builder()
        .name("integration")
        .config(DatabaseConfig::for_testing())
        .open()
        .expect("Failed to open test database")
}

/// Big-endian `u32` key.
pub fn key(i: u32) -> Vec<u8> {
    i.to_be_bytes().to_vec()
}

/// Decode a key produced by [`key`].
pub fn key_index(key: &[u8]) -> u32 {
    u32::from_be_bytes(key.try_into().expect("4-byte key"))
}

/// Collect a result stream, failing the test on the first error.
pub async fn collect_ok<T>(stream: keyspan::ResultStream<T>) -> Vec<T> {
    stream
        .map(|item: std::result::Result<T, StoreError>| item.expect("stream item"))
        .collect()
        .await
}

/// Fill `dict` with `count` keys `key(i) -> [i as u8]`.
pub async fn fill(dict: &Dictionary, count: u32) {
    for i in 0..count {
        dict.put(key(i), vec![i as u8], ResultType::Void)
            .await
            .expect("fill put");
    }
}
