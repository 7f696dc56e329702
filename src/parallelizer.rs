//! Bounded-concurrency dispatch for sampling loops.
//!
//! Estimators fan their downloads out over a fixed number of in-flight
//! futures; shared accumulators are guarded by the caller (a
//! `parking_lot::Mutex` or an atomic). Errors short-circuit the whole batch
//! instead of being swallowed, so a fatal crawl error can never leave the
//! accumulators silently half-filled.

use futures::stream::{self, TryStreamExt};
use std::future::Future;

use crate::error::{CrawlError, CrawlResult};

/// Run `callback` over every item with at most `limit` futures in flight.
///
/// Returns once every callback finished, or as soon as one of them returned
/// an error (remaining callbacks are not started).
pub async fn execute_in_parallel<I, T, F, Fut>(limit: usize, items: I, callback: F) -> CrawlResult<()>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = CrawlResult<()>>,
{
    stream::iter(items.into_iter().map(Ok::<_, CrawlError>))
        .try_for_each_concurrent(limit.max(1), callback)
        .await
}
