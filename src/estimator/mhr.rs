//! Capture–recapture estimation from overflow and overlap rates.
//!
//! Queries are drawn from the pool without replacement; each accepted sample
//! contributes its claimed match count, its returned rows, and its document
//! identifiers. The estimate combines the overflow rate (claimed matches per
//! returned row) with the overlap rate (returned rows per distinct document).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::crawler::CrawlerApi;
use crate::error::CrawlResult;
use crate::parallelizer::execute_in_parallel;
use crate::query_pool::{ShuffledPool, read_query_pool};

use super::{Estimator, UNDEFINED_ESTIMATE, begin_run, report_progress};

/// Exponent of the overlap correction in the published formula.
const OVERLAP_EXPONENT: f64 = -1.1;

/// Sampling bounds for the capture–recapture estimators.
#[derive(Debug, Clone)]
pub struct MhrConfig {
    /// Accepted samples to collect before estimating.
    pub number_queries: usize,
    /// Inclusive lower bound on per-query match counts admitted into the
    /// sample.
    pub min_number_matches: u64,
    /// Inclusive upper bound on per-query match counts admitted into the
    /// sample.
    pub max_number_matches: u64,
}

impl Default for MhrConfig {
    fn default() -> Self {
        Self {
            number_queries: 100,
            min_number_matches: 1,
            max_number_matches: 5_000_000,
        }
    }
}

impl MhrConfig {
    /// Narrow acceptance band, large sample: the "exact" variant.
    pub fn exact() -> Self {
        Self {
            number_queries: 5000,
            min_number_matches: 3500,
            max_number_matches: 4500,
        }
    }

    fn details(&self, query_pool_path: &PathBuf) -> Vec<(String, String)> {
        vec![
            (
                "Number of queries".into(),
                self.number_queries.to_string(),
            ),
            (
                "Min number of matches".into(),
                self.min_number_matches.to_string(),
            ),
            (
                "Max number of matches".into(),
                self.max_number_matches.to_string(),
            ),
            (
                "Query pool file".into(),
                query_pool_path.display().to_string(),
            ),
        ]
    }

    fn accepts(&self, number_matches: u64) -> bool {
        (self.min_number_matches..=self.max_number_matches).contains(&number_matches)
    }
}

#[derive(Default)]
struct Accumulators {
    query_count: u64,
    total_matches: u64,
    total_documents_returned: u64,
    document_frequency: HashMap<String, u64>,
    progress: usize,
}

/// Capture–recapture estimator over uniformly drawn queries.
pub struct Mhr {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: MhrConfig,
    accumulators: Mutex<Accumulators>,
}

impl Mhr {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, MhrConfig::default())
    }

    /// The "exact" variant: identical flow, tighter acceptance bounds.
    pub fn exact(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, MhrConfig::exact())
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: MhrConfig,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
            accumulators: Mutex::new(Accumulators::default()),
        }
    }

    /// Draw queries until one is accepted into the sample or the pool runs
    /// dry. Progress is reported on acceptances only.
    async fn collect_sample(&self, pool: &ShuffledPool) -> CrawlResult<()> {
        loop {
            let Some(query) = pool.take() else {
                return Ok(());
            };
            let result = match self.crawler.download(query, true, false).await {
                Ok(result) => result,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!(query, %error, "download failed, drawing another query");
                    continue;
                }
            };
            if !self.config.accepts(result.number_results()) {
                continue;
            }

            let mut acc = self.accumulators.lock();
            acc.query_count += 1;
            acc.total_matches += result.number_results();
            acc.total_documents_returned += result.results().len() as u64;
            for document in result.results() {
                if let Some(id) = &document.identifier {
                    *acc.document_frequency.entry(id.clone()).or_insert(0) += 1;
                }
            }
            acc.progress += 1;
            report_progress(acc.progress, self.config.number_queries);
            return Ok(());
        }
    }

    fn calculate(&self) -> f64 {
        let acc = self.accumulators.lock();
        let unique = acc.document_frequency.len() as u64;
        calculate_estimate(acc.total_matches, acc.total_documents_returned, unique)
    }
}

/// Shared closed form: overflow · unique / (1 − overlap^−1.1), undefined when
/// a denominator vanishes or every returned row was distinct.
fn calculate_estimate(total_matches: u64, total_documents_returned: u64, unique: u64) -> f64 {
    if total_documents_returned == 0 || unique == 0 {
        debug!(
            total_documents_returned,
            unique, "estimate undefined: nothing accepted into the sample"
        );
        return UNDEFINED_ESTIMATE;
    }
    let overflow_rate = total_matches as f64 / total_documents_returned as f64;
    let overlapping_rate = total_documents_returned as f64 / unique as f64;
    if overlapping_rate == 1.0 {
        debug!(
            total_documents_returned,
            unique, "estimate undefined: no overlap between samples"
        );
        return UNDEFINED_ESTIMATE;
    }
    overflow_rate * unique as f64 / (1.0 - overlapping_rate.powf(OVERLAP_EXPONENT))
}

#[async_trait]
impl Estimator for Mhr {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        *self.accumulators.lock() = Accumulators::default();
        let pool = ShuffledPool::new(read_query_pool(&self.query_pool_path)?);
        execute_in_parallel(
            self.crawler.thread_limit(),
            0..self.config.number_queries,
            |_| self.collect_sample(&pool),
        )
        .await?;
        Ok(self.calculate())
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        self.config.details(&self.query_pool_path)
    }

    fn download_count(&self) -> u64 {
        self.crawler.download_count()
    }
}

#[derive(Default)]
struct TeacherAccumulators {
    query_count: u64,
    total_matches: u64,
    total_documents_returned: u64,
    total_unique_documents_returned: u64,
    last_iteration_new_ids: Vec<String>,
    progress: usize,
}

/// Capture–recapture variant that counts a document as "new" only when it was
/// absent from the immediately preceding sample's result list; its overlap
/// uses that running count instead of a global frequency table. Runs its
/// samples one at a time, since each depends on the previous one.
pub struct TeacherMhr {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: MhrConfig,
    accumulators: Mutex<TeacherAccumulators>,
}

impl TeacherMhr {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, MhrConfig::default())
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: MhrConfig,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
            accumulators: Mutex::new(TeacherAccumulators::default()),
        }
    }

    async fn collect_sample(&self, pool: &ShuffledPool) -> CrawlResult<()> {
        let Some(query) = pool.take() else {
            return Ok(());
        };
        let result = match self.crawler.download(query, true, false).await {
            Ok(result) => result,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                debug!(query, %error, "download failed, skipping sample");
                return Ok(());
            }
        };
        if !self.config.accepts(result.number_results()) {
            return Ok(());
        }

        let ids: Vec<String> = result
            .results()
            .iter()
            .filter_map(|d| d.identifier.clone())
            .collect();
        let mut acc = self.accumulators.lock();
        acc.query_count += 1;
        acc.total_matches += result.number_results();
        acc.total_documents_returned += result.results().len() as u64;
        let new_ids: Vec<String> = ids
            .into_iter()
            .filter(|id| !acc.last_iteration_new_ids.contains(id))
            .collect();
        acc.total_unique_documents_returned += new_ids.len() as u64;
        acc.last_iteration_new_ids = new_ids;
        acc.progress += 1;
        report_progress(acc.progress, self.config.number_queries);
        Ok(())
    }
}

#[async_trait]
impl Estimator for TeacherMhr {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        *self.accumulators.lock() = TeacherAccumulators::default();
        let pool = ShuffledPool::new(read_query_pool(&self.query_pool_path)?);
        // One sample at a time: "new" is defined against the previous sample.
        execute_in_parallel(1, 0..self.config.number_queries, |_| {
            self.collect_sample(&pool)
        })
        .await?;
        let acc = self.accumulators.lock();
        Ok(calculate_estimate(
            acc.total_matches,
            acc.total_documents_returned,
            acc.total_unique_documents_returned,
        ))
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        self.config.details(&self.query_pool_path)
    }

    fn download_count(&self) -> u64 {
        self.crawler.download_count()
    }
}
