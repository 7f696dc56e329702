//! Query pool loading and random draw-without-replacement.

use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{CrawlError, CrawlResult};

/// Read the query pool file: one query per line, trailing CR/LF stripped,
/// order preserved. An empty pool is fatal.
pub fn read_query_pool(path: &Path) -> CrawlResult<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let pool: Vec<String> = raw
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    if pool.is_empty() {
        return Err(CrawlError::fatal(format!(
            "query pool file {} is empty",
            path.display()
        )));
    }
    Ok(pool)
}

/// Uniform draw-without-replacement over a query pool.
///
/// The pool is shuffled once at construction and consumed through an atomic
/// cursor, so concurrent samplers never hand out the same query twice and
/// never contend on a lock.
pub struct ShuffledPool {
    queries: Vec<String>,
    cursor: AtomicUsize,
}

impl ShuffledPool {
    pub fn new(mut queries: Vec<String>) -> Self {
        queries.shuffle(&mut rand::rng());
        Self {
            queries,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Draw the next query, or `None` once the pool is exhausted.
    pub fn take(&self) -> Option<&str> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.queries.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
