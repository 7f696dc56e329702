//! Shared fakes for crawler and estimator tests.
//!
//! `MockCrawler` is a deterministic in-memory engine; `MockFetcher` serves
//! canned HTML pages per URL; `TestSite` is a minimal site-rules
//! implementation over a line-oriented page format, so the scraping
//! crawler's pagination logic can be exercised without real markup.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use fathom::{CrawlError, CrawlResult, CrawlerApi, Data, PageFetcher, SearchResult, SiteRules};

pub fn doc(id: &str, content: &str) -> Data {
    Data::new(Some(id.to_string()), Some(content.to_string()))
}

/// Write a query pool file into `dir` and return its path.
pub fn write_pool(dir: &std::path::Path, queries: &[&str]) -> std::path::PathBuf {
    let path = dir.join("pool.txt");
    std::fs::write(&path, queries.join("\n")).expect("pool file writes");
    path
}

/// Deterministic in-memory engine: a map from query to its full result list.
/// Downloads count once per call, like a live direct-JSON engine.
pub struct MockCrawler {
    results: HashMap<String, Vec<Data>>,
    entire_data_set: Option<Vec<Data>>,
    downloads: AtomicU64,
    limit: AtomicU64,
    thread_limit: usize,
}

impl Default for MockCrawler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCrawler {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            entire_data_set: None,
            downloads: AtomicU64::new(0),
            limit: AtomicU64::new(5_000_000),
            thread_limit: 4,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: &str, results: Vec<Data>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    #[must_use]
    pub fn with_entire_data_set(mut self, documents: Vec<Data>) -> Self {
        self.entire_data_set = Some(documents);
        self
    }

    #[must_use]
    pub fn with_thread_limit(mut self, thread_limit: usize) -> Self {
        self.thread_limit = thread_limit;
        self
    }

    fn rows(&self, query: &str) -> &[Data] {
        self.results.get(query).map_or(&[], Vec::as_slice)
    }
}

#[async_trait]
impl CrawlerApi for MockCrawler {
    async fn download(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
    ) -> CrawlResult<SearchResult> {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows(query);
        let capped: Vec<Data> = rows
            .iter()
            .take(self.limit_results_per_query() as usize)
            .cloned()
            .collect();
        Ok(SearchResult::new(rows.len() as u64, capped).project(want_id, want_content))
    }

    async fn download_item(&self, query: &str, index: u64) -> CrawlResult<SearchResult> {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows(query);
        let number_results = rows.len() as u64;
        if number_results == 0 {
            return Ok(SearchResult::empty(0));
        }
        if index >= number_results {
            return Err(CrawlError::fatal(format!(
                "index {index} out of range for query \"{query}\""
            )));
        }
        Ok(SearchResult::new(
            number_results,
            vec![rows[index as usize].clone()],
        ))
    }

    async fn download_entire_data_set(&self) -> CrawlResult<SearchResult> {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        match &self.entire_data_set {
            Some(documents) => Ok(SearchResult::new(
                documents.len() as u64,
                documents.clone(),
            )),
            None => Err(CrawlError::fatal("engine cannot serve its entire data set")),
        }
    }

    fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }

    fn reset_download_count(&self) {
        self.downloads.store(0, Ordering::Relaxed);
    }

    fn limit_results_per_query(&self) -> u64 {
        self.limit.load(Ordering::Relaxed)
    }

    fn set_limit_results_per_query(&self, limit: u64) {
        self.limit.store(limit, Ordering::Relaxed);
    }

    fn thread_limit(&self) -> usize {
        self.thread_limit
    }

    fn wipe_cache(&self) {}
}

/// Canned page fetcher. Pages queue per URL; once a queue is down to its
/// last entry that entry repeats, so retry loops observe a stable page.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, VecDeque<String>>>,
    fetches: AtomicU64,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(html.to_string());
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_until(
        &self,
        url: &str,
        ready: &(dyn for<'a> Fn(&'a str) -> bool + Sync),
    ) -> CrawlResult<String> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let html = {
            let mut pages = self.pages.lock();
            let queue = pages
                .get_mut(url)
                .ok_or_else(|| CrawlError::Browser(format!("no page queued for {url}")))?;
            if queue.len() > 1 {
                queue.pop_front().expect("queue is non-empty")
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| CrawlError::Browser(format!("no page queued for {url}")))?
            }
        };
        if !ready(&html) {
            return Err(CrawlError::Browser(format!(
                "page never became ready: {url}"
            )));
        }
        Ok(html)
    }
}

pub const TEST_SITE_PAGE_SIZE: u64 = 20;

/// Minimal scraped engine: pages are plain text, one `count=N` line plus one
/// `item|<id>|<content>` line per row, 20 rows per page, 0-based page
/// numbers in the URL.
pub struct TestSite {
    pub keep_inconsistent_pages: bool,
}

impl TestSite {
    pub fn strict() -> Self {
        Self {
            keep_inconsistent_pages: false,
        }
    }

    pub fn lenient() -> Self {
        Self {
            keep_inconsistent_pages: true,
        }
    }

    /// URL the crawler will request for `query` once `items_downloaded` rows
    /// are in hand.
    pub fn page_url(query: &str, items_downloaded: u64) -> String {
        format!(
            "http://engine.test/search?q={query}&page={}",
            items_downloaded / TEST_SITE_PAGE_SIZE
        )
    }
}

/// Render a page claiming `count` total matches and carrying rows
/// `[first_row, first_row + rows)`.
pub fn test_page(count: u64, first_row: u64, rows: u64) -> String {
    let mut page = format!("count={count}\n");
    for row in first_row..first_row + rows {
        page.push_str(&format!("item|id-{row}|document body {row}\n"));
    }
    page
}

impl SiteRules for TestSite {
    fn name(&self) -> &str {
        "test-site"
    }

    fn url_template(&self) -> &str {
        "http://engine.test/search?q=<<query>>&page=<<offset>>"
    }

    fn page_size(&self) -> u64 {
        TEST_SITE_PAGE_SIZE
    }

    fn page_offset(&self, items_downloaded: u64) -> u64 {
        items_downloaded / TEST_SITE_PAGE_SIZE
    }

    fn number_matches(&self, html: &str) -> Option<u64> {
        html.lines()
            .find_map(|line| line.strip_prefix("count="))
            .and_then(|raw| raw.trim().parse().ok())
    }

    fn extract_items(&self, html: &str) -> CrawlResult<Vec<Data>> {
        html.lines()
            .filter(|line| line.starts_with("item|"))
            .map(|line| {
                let mut fields = line.splitn(3, '|');
                fields.next();
                let id = fields
                    .next()
                    .ok_or_else(|| CrawlError::fatal("data extraction failure: row without id"))?;
                let content = fields.next().unwrap_or_default();
                Ok(Data::new(Some(id.to_string()), Some(content.to_string())))
            })
            .collect()
    }

    fn settle_inconsistent_page(&self, items: Vec<Data>) -> Vec<Data> {
        if self.keep_inconsistent_pages {
            items
        } else {
            Vec::new()
        }
    }

    fn data_set_size_url(&self) -> &str {
        "http://engine.test/about"
    }

    fn extract_data_set_size(&self, html: &str) -> Option<u64> {
        html.lines()
            .find_map(|line| line.strip_prefix("corpus="))
            .and_then(|raw| raw.trim().parse().ok())
    }
}
