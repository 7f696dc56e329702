//! Per-query persistent store of search results.
//!
//! One binary file per query keeps a scrape resumable across crashes: the
//! crawler consults the cache before touching the network, and a hit costs
//! nothing against the download counter. The cache is advisory for
//! correctness: the crawler produces the invariant-preserving result before
//! `put`, and anything that fails to decode is simply treated as absent.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::data::SearchResult;
use crate::error::CrawlResult;

/// Marker file kept in the data directory so `wipe()` never empties the
/// directory out of existence under version control.
const SENTINEL_FILE: &str = ".gitignore";

const ENTRY_EXTENSION: &str = "bin";

/// File-per-query store of [`SearchResult`] blobs.
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    /// Open (creating if necessary) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> CrawlResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the entry for `query`. Query strings are used as the filename
    /// stem after sanitisation, so queries with path separators or other
    /// filesystem-hostile characters map onto safe names.
    #[must_use]
    pub fn entry_path(&self, query: &str) -> PathBuf {
        let stem = sanitize_filename::sanitize(query);
        self.dir.join(format!("{stem}.{ENTRY_EXTENSION}"))
    }

    /// Fetch the persisted result for `query`, or `None` when the entry is
    /// missing or cannot be decoded.
    pub fn get(&self, query: &str) -> Option<SearchResult> {
        let path = self.entry_path(query);
        let bytes = std::fs::read(&path).ok()?;
        match bincode::deserialize(&bytes) {
            Ok(result) => Some(result),
            Err(error) => {
                debug!(
                    path = %path.display(),
                    %error,
                    "cache entry undecodable, treating as a miss"
                );
                None
            }
        }
    }

    /// Persist `result` under `query`, replacing any previous entry.
    pub fn put(&self, query: &str, result: &SearchResult) -> CrawlResult<()> {
        let bytes = bincode::serialize(result)
            .map_err(|e| crate::error::CrawlError::Decode(e.to_string()))?;
        std::fs::write(self.entry_path(query), bytes)?;
        Ok(())
    }

    /// Delete every entry, preserving the sentinel marker file. Individual
    /// unlink failures are logged and skipped.
    pub fn wipe(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(dir = %self.dir.display(), %error, "cache wipe skipped");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_name().is_some_and(|n| n == SENTINEL_FILE) {
                continue;
            }
            if path.is_file()
                && let Err(error) = std::fs::remove_file(&path)
            {
                warn!(path = %path.display(), %error, "failed to remove cache entry");
            }
        }
    }
}
