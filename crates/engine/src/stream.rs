//! Result streams
//!
//! Range reads are produced on the storage pool and delivered through a
//! bounded channel. The producer does not start until the stream is first
//! polled, and it stops as soon as the stream is dropped: its next send
//! fails, it returns, and the engine cursor it owned is dropped with it.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use keyspan_concurrency::StoragePool;
use keyspan_core::{Key, Result, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Stream of fallible items.
pub type ResultStream<T> = BoxStream<'static, Result<T>>;

/// Stream of key/value entries.
pub type EntryStream = ResultStream<(Key, Value)>;

/// Stream of keys.
pub type KeyStream = ResultStream<Key>;

/// Lazily start `producer` on the pool's scan budget and stream what it sends.
pub(crate) fn produce<T, F>(pool: StoragePool, buffer: usize, producer: F) -> ResultStream<T>
where
    T: Send + 'static,
    F: FnOnce(&mpsc::Sender<Result<T>>) -> Result<()> + Send + 'static,
{
    stream::once(async move {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        pool.spawn_scan(tx, producer);
        ReceiverStream::new(rx)
    })
    .flatten()
    .boxed()
}

/// Send one item from a blocking producer. `false` once the consumer is gone.
pub(crate) fn emit<T>(tx: &mpsc::Sender<Result<T>>, item: T) -> bool {
    tx.blocking_send(Ok(item)).is_ok()
}

/// Group a stream into windows of at most `max_items` items and roughly
/// `max_bytes` bytes. A window always holds at least one item, so a single
/// oversized item still makes progress.
pub(crate) fn windows<S, T>(
    input: S,
    max_items: usize,
    max_bytes: usize,
    size_of: fn(&T) -> usize,
) -> BoxStream<'static, Vec<T>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let max_items = max_items.max(1);
    stream::unfold((input.boxed(), false), move |(mut input, exhausted)| async move {
        if exhausted {
            return None;
        }
        let mut window = Vec::new();
        let mut bytes = 0usize;
        let mut ended = false;
        while window.is_empty() || (window.len() < max_items && bytes < max_bytes) {
            match input.next().await {
                Some(item) => {
                    bytes += size_of(&item);
                    window.push(item);
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }
        if window.is_empty() {
            None
        } else {
            Some((window, (input, ended)))
        }
    })
    .boxed()
}

/// Flatten a stream of fallible batches into a stream of fallible items.
pub(crate) fn flatten_batches<T>(batches: BoxStream<'static, Result<Vec<T>>>) -> ResultStream<T>
where
    T: Send + 'static,
{
    batches
        .flat_map(|batch| match batch {
            Ok(items) => stream::iter(items.into_iter().map(Ok)).left_stream(),
            Err(e) => stream::once(async move { Err(e) }).right_stream(),
        })
        .boxed()
}
