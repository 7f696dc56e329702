//! Direct-JSON crawler for Solr-style engines.
//!
//! One HTTP GET per call: the URL template is filled with query, offset,
//! limit, the field to search, and the fields to return, and the JSON
//! response is mapped straight into a [`SearchResult`]. No cache is
//! consulted; every call is a live query.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::data::{Data, SearchResult};
use crate::error::{CrawlError, CrawlResult};

use super::{CrawlerApi, DownloadCounter};

const DEFAULT_LIMIT_RESULTS: u64 = 5_000_000;
const THREAD_LIMIT: usize = 5;
const FETCH_ATTEMPTS: usize = 5;

const ID_FIELD: &str = "id";
const FIELD_TO_SEARCH: &str = "text";
/// Row count used when pulling the entire data set through the wildcard
/// query.
const ENTIRE_DATA_SET_ROWS: u64 = 1_000_000;

const QUERY_MASK: &str = "::QUERY::";
const OFFSET_MASK: &str = "::OFFSET::";
const LIMIT_MASK: &str = "::LIMIT::";
const FIELD_TO_SEARCH_MASK: &str = "::FIELD::";
const FIELDS_TO_RETURN_MASK: &str = "::FIELDS_TO_RETURN::";

/// Shape of the engine's JSON envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    response: Body,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "numFound")]
    num_found: u64,
    docs: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Crawler for an engine answering templated GETs with
/// `{"response": {"numFound": .., "docs": [..]}}` bodies.
pub struct SolrCrawler {
    url_template: String,
    client: reqwest::Client,
    limit_results_per_query: AtomicU64,
    downloads: DownloadCounter,
}

impl SolrCrawler {
    /// `url_template` must contain the `::QUERY::`, `::OFFSET::`,
    /// `::LIMIT::`, `::FIELD::` and `::FIELDS_TO_RETURN::` masks.
    pub fn new(url_template: impl Into<String>) -> Self {
        Self::with_limit(url_template, DEFAULT_LIMIT_RESULTS)
    }

    pub fn with_limit(url_template: impl Into<String>, limit_results_per_query: u64) -> Self {
        Self {
            url_template: url_template.into(),
            client: reqwest::Client::new(),
            limit_results_per_query: AtomicU64::new(limit_results_per_query),
            downloads: DownloadCounter::default(),
        }
    }

    fn render_url(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
        offset: u64,
        limit: u64,
        field_to_search: &str,
    ) -> String {
        let fields_to_return = match (want_id, want_content) {
            (true, true) => format!("{ID_FIELD},{FIELD_TO_SEARCH}"),
            (false, true) => FIELD_TO_SEARCH.to_string(),
            _ => ID_FIELD.to_string(),
        };
        self.url_template
            .replace(QUERY_MASK, &urlencoding::encode(query))
            .replace(OFFSET_MASK, &offset.to_string())
            .replace(LIMIT_MASK, &limit.to_string())
            .replace(FIELD_TO_SEARCH_MASK, field_to_search)
            .replace(FIELDS_TO_RETURN_MASK, &fields_to_return)
    }

    async fn fetch(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
        offset: u64,
        limit: u64,
        field_to_search: &str,
    ) -> CrawlResult<SearchResult> {
        let url = self.render_url(query, want_id, want_content, offset, limit, field_to_search);
        let mut last_error = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            match self.fetch_once(&url).await {
                Ok(envelope) => {
                    self.downloads.increment();
                    return Ok(Self::to_search_result(envelope));
                }
                Err(error) => {
                    warn!(%url, attempt, %error, "engine request failed");
                    last_error = Some(error);
                    if attempt < FETCH_ATTEMPTS {
                        let backoff = Duration::from_millis(100 * 2u64.pow(attempt as u32 - 1));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(CrawlError::fatal(format!(
            "engine unreachable after {FETCH_ATTEMPTS} attempts: {}",
            last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        )))
    }

    async fn fetch_once(&self, url: &str) -> CrawlResult<Envelope> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<Envelope>().await?)
    }

    /// Probe the engine's full corpus size with a wildcard count query. Used
    /// to calibrate experiment logs; not counted as a download.
    pub async fn data_set_size(&self) -> CrawlResult<u64> {
        let url = self.render_url("*", true, false, 0, 1, "*");
        let envelope = self.fetch_once(&url).await?;
        Ok(envelope.response.num_found)
    }

    fn to_search_result(envelope: Envelope) -> SearchResult {
        let results = envelope
            .response
            .docs
            .into_iter()
            .map(|doc| {
                Data::new(
                    doc.get(ID_FIELD).and_then(|v| v.as_str()).map(String::from),
                    doc.get(FIELD_TO_SEARCH)
                        .and_then(|v| v.as_str())
                        .map(String::from),
                )
            })
            .collect();
        SearchResult::new(envelope.response.num_found, results)
    }
}

#[async_trait]
impl CrawlerApi for SolrCrawler {
    async fn download(
        &self,
        query: &str,
        want_id: bool,
        want_content: bool,
    ) -> CrawlResult<SearchResult> {
        self.fetch(
            query,
            want_id,
            want_content,
            0,
            self.limit_results_per_query(),
            FIELD_TO_SEARCH,
        )
        .await
    }

    async fn download_item(&self, query: &str, index: u64) -> CrawlResult<SearchResult> {
        let result = self
            .fetch(query, true, true, index, 1, FIELD_TO_SEARCH)
            .await?;
        if result.number_results() > 0 && index >= result.number_results() {
            return Err(CrawlError::fatal(format!(
                "index {index} out of range for query \"{query}\" ({} matches)",
                result.number_results()
            )));
        }
        Ok(result)
    }

    async fn download_entire_data_set(&self) -> CrawlResult<SearchResult> {
        self.fetch("*", true, true, 0, ENTIRE_DATA_SET_ROWS, "*").await
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
        THREAD_LIMIT
    }

    fn wipe_cache(&self) {}
}
