//! Paginated scraping crawler shared by every HTML-scraped engine.
//!
//! A query resolves in three steps: consult the per-query cache, otherwise
//! assemble the complete result from rendered pages (honouring the per-page
//! occupancy rule and the per-query result cap), then persist and serve the
//! projection the caller asked for. All site-specific behaviour is delegated
//! to a [`SiteRules`] implementation.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::data::{Data, SearchResult};
use crate::error::{CrawlError, CrawlResult};

use super::fetch::PageFetcher;
use super::sites::SiteRules;
use super::{CrawlerApi, DownloadCounter};

const QUERY_MASK: &str = "<<query>>";
const OFFSET_MASK: &str = "<<offset>>";

/// Pause before every page request.
const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);

/// Attempts before a failing page request becomes fatal.
const DOWNLOAD_TRY_NUMBER: usize = 10_000;

/// Attempts to re-fetch a page whose row count violates the occupancy rule.
const OCCUPANCY_ATTEMPTS: usize = 5;

const DEFAULT_LIMIT_RESULTS: u64 = 5_000_000;

/// Crawler over a paginated, HTML-scraped search engine.
pub struct WebsiteCrawler<R: SiteRules> {
    rules: R,
    fetcher: Arc<dyn PageFetcher>,
    cache: ResultCache,
    limit_results_per_query: AtomicU64,
    downloads: DownloadCounter,
    crawl_delay: Duration,
}

impl<R: SiteRules> WebsiteCrawler<R> {
    pub fn new(
        rules: R,
        fetcher: Arc<dyn PageFetcher>,
        cache_dir: impl AsRef<Path>,
    ) -> CrawlResult<Self> {
        Self::with_limit(rules, fetcher, cache_dir, DEFAULT_LIMIT_RESULTS)
    }

    pub fn with_limit(
        rules: R,
        fetcher: Arc<dyn PageFetcher>,
        cache_dir: impl AsRef<Path>,
        limit_results_per_query: u64,
    ) -> CrawlResult<Self> {
        Ok(Self {
            rules,
            fetcher,
            cache: ResultCache::new(cache_dir.as_ref())?,
            limit_results_per_query: AtomicU64::new(limit_results_per_query),
            downloads: DownloadCounter::default(),
            crawl_delay: DEFAULT_CRAWL_DELAY,
        })
    }

    /// Override the pause between page requests. Tests shrink it to zero.
    #[must_use]
    pub fn with_crawl_delay(mut self, crawl_delay: Duration) -> Self {
        self.crawl_delay = crawl_delay;
        self
    }

    fn render_url(&self, query: &str, items_downloaded: u64) -> String {
        let offset = self.rules.page_offset(items_downloaded);
        self.rules
            .url_template()
            .replace(QUERY_MASK, &urlencoding::encode(query))
            .replace(OFFSET_MASK, &offset.to_string())
    }

    /// Fetch one rendered page, retrying transient failures until the retry
    /// budget runs out. Every successful fetch counts one download.
    async fn attempt_download(&self, query: &str, items_downloaded: u64) -> CrawlResult<String> {
        let url = self.render_url(query, items_downloaded);
        let ready = |html: &str| self.rules.number_matches(html).is_some();
        for attempt in 1..=DOWNLOAD_TRY_NUMBER {
            tokio::time::sleep(self.crawl_delay).await;
            match self.fetcher.fetch_until(&url, &ready).await {
                Ok(html) => {
                    self.downloads.increment();
                    return Ok(html);
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(%url, attempt, %error, "page fetch failed, retrying");
                }
            }
        }
        Err(CrawlError::fatal(format!(
            "internet connection failure: {url}"
        )))
    }

    /// Rows the page after `items_downloaded` rows must carry: a full page
    /// while enough matches remain, the remainder otherwise.
    fn expected_page_len(&self, number_matches: u64, items_downloaded: u64) -> u64 {
        let page_size = self.rules.page_size();
        if number_matches.saturating_sub(items_downloaded) >= page_size {
            page_size
        } else {
            number_matches % page_size
        }
    }

    /// Fetch one page and re-fetch until its row count satisfies the
    /// occupancy rule, falling back to the site's inconsistent-page policy
    /// once the attempts are spent.
    async fn fetch_consistent_page(
        &self,
        query: &str,
        number_matches: u64,
        items_downloaded: u64,
    ) -> CrawlResult<Vec<Data>> {
        let expected = self.expected_page_len(number_matches, items_downloaded);
        let mut items = Vec::new();
        for _ in 0..OCCUPANCY_ATTEMPTS {
            let html = self.attempt_download(query, items_downloaded).await?;
            items = self.rules.extract_items(&html)?;
            if items.len() as u64 == expected {
                return Ok(items);
            }
        }
        warn!(
            query,
            page_items = items.len(),
            expected,
            items_downloaded,
            number_matches,
            page_size = self.rules.page_size(),
            "page occupancy mismatch persisted; settling with the site policy"
        );
        Ok(self.rules.settle_inconsistent_page(items))
    }

    /// Pages still needed to reach `target` rows after `items_downloaded`.
    fn additional_pages(&self, target: u64, items_downloaded: u64) -> u64 {
        let page_size = self.rules.page_size();
        if target <= page_size || items_downloaded >= target {
            0
        } else {
            (target - items_downloaded).div_ceil(page_size)
        }
    }

    /// Extend the first page's rows with as many further pages as the match
    /// count and the per-query cap require, then clamp to the invariants.
    async fn extend_to_full_result(
        &self,
        query: &str,
        number_matches: u64,
        mut items: Vec<Data>,
    ) -> CrawlResult<SearchResult> {
        let already = items.len() as u64;
        let limit = self.limit_results_per_query();
        if already <= number_matches {
            let target = number_matches.min(limit);
            for page in 0..self.additional_pages(target, already) {
                let items_downloaded = already + page * self.rules.page_size();
                let rows = self
                    .fetch_consistent_page(query, number_matches, items_downloaded)
                    .await?;
                items.extend(rows);
            }
        }

        let assembled = items.len() as u64;
        if limit < number_matches && assembled > limit {
            if assembled - limit >= self.rules.page_size() {
                warn!(
                    query,
                    excess = assembled - limit,
                    "downloaded unnecessary pages past the result cap"
                );
            }
            items.truncate(limit as usize);
        }
        if items.len() as u64 > number_matches {
            warn!(
                query,
                rows = items.len(),
                number_matches,
                "engine served more rows than it claims to match; truncating"
            );
            items.truncate(number_matches as usize);
        }
        Ok(SearchResult::new(number_matches, items))
    }

    /// Probe the engine's own announcement of its full corpus size. Used to
    /// calibrate experiment logs; not counted as a download.
    pub async fn data_set_size(&self) -> CrawlResult<u64> {
        let url = self.rules.data_set_size_url();
        let ready = |html: &str| self.rules.extract_data_set_size(html).is_some();
        tokio::time::sleep(self.crawl_delay).await;
        let html = self.fetcher.fetch_until(url, &ready).await?;
        self.rules.extract_data_set_size(&html).ok_or_else(|| {
            CrawlError::Decode(format!("corpus size unrecognisable at {url}"))
        })
    }

    /// Assemble the complete result for `query` from the engine and persist
    /// it.
    async fn download_from_engine(&self, query: &str) -> CrawlResult<SearchResult> {
        let html = self.attempt_download(query, 0).await?;
        let number_matches = self.rules.number_matches(&html).ok_or_else(|| {
            CrawlError::Decode(format!("match count unrecognisable for query \"{query}\""))
        })?;
        if number_matches == 0 {
            let result = SearchResult::empty(0);
            self.cache.put(query, &result)?;
            return Ok(result);
        }

        let mut items = self.rules.extract_items(&html)?;
        if items.len() as u64 != self.expected_page_len(number_matches, 0) {
            items = self.fetch_consistent_page(query, number_matches, 0).await?;
        }
        let result = self
            .extend_to_full_result(query, number_matches, items)
            .await?;

        let rows = result.results().len() as u64;
        let expected_rows = number_matches.min(self.limit_results_per_query());
        if rows != expected_rows {
            warn!(
                query,
                rows,
                expected_rows,
                "assembled fewer rows than the engine claims; persisting anyway"
            );
        }
        self.cache.put(query, &result)?;
        info!(
            query,
            number_matches, rows, "query fully assembled and cached"
        );
        Ok(result)
    }
}

#[async_trait]
impl<R: SiteRules> CrawlerApi for WebsiteCrawler<R> {
    async fn download(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
    ) -> CrawlResult<SearchResult> {
        let result = match self.cache.get(query) {
            Some(stored) => stored,
            None => self.download_from_engine(query).await?,
        };
        Ok(result.project(want_id, want_content))
    }

    async fn download_item(&self, query: &str, index: u64) -> CrawlResult<SearchResult> {
        let html = self.attempt_download(query, index).await?;
        let number_matches = self.rules.number_matches(&html).ok_or_else(|| {
            CrawlError::Decode(format!("match count unrecognisable for query \"{query}\""))
        })?;
        if number_matches == 0 {
            return Ok(SearchResult::empty(0));
        }
        if index >= number_matches {
            return Err(CrawlError::fatal(format!(
                "index {index} out of range for query \"{query}\" ({number_matches} matches)"
            )));
        }
        let items = self.rules.extract_items(&html)?;
        let list_index = (index % self.rules.page_size()) as usize;
        Ok(match items.get(list_index) {
            Some(item) => SearchResult::new(number_matches, vec![item.clone()]),
            None => SearchResult::empty(number_matches),
        })
    }

    async fn download_entire_data_set(&self) -> CrawlResult<SearchResult> {
        Err(CrawlError::fatal(format!(
            "the {} engine cannot serve its entire data set",
            self.rules.name()
        )))
    }

    fn download_count(&self) -> u64 {
        self.downloads.get()
    }

    fn reset_download_count(&self) {
        self.downloads.reset();
    }

    fn limit_results_per_query(&self) -> u64 {
        self.limit_results_per_query.load(Ordering::Relaxed)
    }

    fn set_limit_results_per_query(&self, limit: u64) {
        self.limit_results_per_query.store(limit, Ordering::Relaxed);
    }

    fn thread_limit(&self) -> usize {
        self.rules.thread_limit()
    }

    fn wipe_cache(&self) {
        self.cache.wipe();
    }
}
