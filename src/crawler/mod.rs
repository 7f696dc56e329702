//! The query-interface abstraction estimators sample through.
//!
//! Estimators never touch the network or the on-disk cache directly: every
//! query goes through a [`CrawlerApi`] implementation, which is responsible
//! for assembling complete, invariant-preserving results and for the
//! download accounting the experiment logs report.

pub mod fetch;
pub mod sites;
pub mod solr;
pub mod website;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::data::SearchResult;
use crate::error::CrawlResult;

pub use fetch::{ChromiumFetcher, PageFetcher};
pub use sites::{ExploreSite, PortalSite, SiteRules};
pub use solr::SolrCrawler;
pub use website::WebsiteCrawler;

/// Process-wide count of real engine round-trips, incremented exactly once
/// per successful fetch and never on a cache hit.
#[derive(Debug, Default)]
pub struct DownloadCounter(AtomicU64);

impl DownloadCounter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Uniform access to a capped search engine.
#[async_trait]
pub trait CrawlerApi: Send + Sync {
    /// Return the complete retrievable set of documents matching `query`,
    /// capped at `limit_results_per_query`, each row projected to carry only
    /// the requested fields.
    async fn download(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
    ) -> CrawlResult<SearchResult>;

    /// Return a one-element result holding the document at position `index`
    /// in the engine's ordering for `query`, with `number_results` set to the
    /// total match count. An index past the match count is fatal; an engine
    /// page that refuses to serve the row yields an empty row list instead.
    async fn download_item(&self, query: &str, index: u64) -> CrawlResult<SearchResult>;

    /// Total match count the engine claims for `query`.
    async fn retrieve_number_matches(&self, query: &str) -> CrawlResult<u64> {
        Ok(self.download_item(query, 0).await?.number_results())
    }

    /// Every document the engine holds. Only supported by engines whose
    /// protocol allows it; scraped engines fail fatally here.
    async fn download_entire_data_set(&self) -> CrawlResult<SearchResult>;

    fn download_count(&self) -> u64;

    fn reset_download_count(&self);

    fn limit_results_per_query(&self) -> u64;

    /// Adjust the per-query result cap. The Shokouhi estimators clamp the
    /// engine to their factor K before sampling.
    fn set_limit_results_per_query(&self, limit: u64);

    /// Concurrency the engine tolerates; estimators bound their dispatch by
    /// this.
    fn thread_limit(&self) -> usize;

    /// Drop any persisted per-query results. Called at the start of every
    /// estimation run; a no-op for engines that keep no cache.
    fn wipe_cache(&self);
}
