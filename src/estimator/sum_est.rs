//! Horvitz–Thompson estimation over query–document pairs.
//!
//! Each iteration rejection-samples a (query, document) pair, estimates the
//! document's inverse degree by repeated draws from its matching-query list,
//! and weighs the query's own degree against the estimated usable pool size.
//! Matching is the local substring predicate.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::crawler::CrawlerApi;
use crate::data::Data;
use crate::error::CrawlResult;
use crate::parallelizer::execute_in_parallel;
use crate::query_pool::read_query_pool;

use super::{Estimator, begin_run, report_progress, verify_match};

/// Iteration and sampling parameters.
#[derive(Debug, Clone)]
pub struct SumEstConfig {
    pub iterations: usize,
    /// Trials used to estimate how much of the pool yields visible matches.
    pub pool_sample_size: usize,
    /// Concurrency for the local matching scans.
    pub thread_limit: usize,
}

impl Default for SumEstConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            pool_sample_size: 1000,
            thread_limit: 10,
        }
    }
}

/// Horvitz–Thompson estimator over query–document pairs.
pub struct SumEst {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: SumEstConfig,
}

impl SumEst {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, SumEstConfig::default())
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: SumEstConfig,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
        }
    }

    /// Estimate how many pool queries produce at least one visible match:
    /// uniform trials with replacement, scaled back to the pool size.
    async fn estimate_pool_size(&self, pool: &[String]) -> CrawlResult<f64> {
        let count = Mutex::new(0u64);
        execute_in_parallel(
            self.crawler.thread_limit(),
            0..self.config.pool_sample_size,
            |_| {
                let count = &count;
                async move {
                    let query = &pool[rand::rng().random_range(0..pool.len())];
                    let results = self.crawler.download(query, true, true).await?;
                    if results.results().iter().any(|d| verify_match(query, d)) {
                        *count.lock() += 1;
                    }
                    Ok(())
                }
            },
        )
        .await?;
        let count = *count.lock();
        Ok(pool.len() as f64 * count as f64 / self.config.pool_sample_size as f64)
    }

    /// Rejection-sample a pair: draw queries until one returns at least one
    /// document that actually contains it, then pick one of those uniformly.
    async fn select_query_document_pair(&self, pool: &[String]) -> CrawlResult<(String, Data)> {
        loop {
            let query = &pool[rand::rng().random_range(0..pool.len())];
            let results = match self.crawler.download(query, true, true).await {
                Ok(results) => results,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!(query, %error, "download failed, redrawing the pair");
                    continue;
                }
            };
            let valid: Vec<&Data> = results
                .results()
                .iter()
                .filter(|d| verify_match(query, d))
                .collect();
            if !valid.is_empty() {
                let document = valid[rand::rng().random_range(0..valid.len())].clone();
                return Ok((query.clone(), document));
            }
        }
    }

    /// Every pool query whose text occurs in the document content.
    async fn matching_query_list(&self, document: &Data, pool: &[String]) -> CrawlResult<Vec<String>> {
        let matching = Mutex::new(Vec::new());
        execute_in_parallel(self.config.thread_limit, pool.iter(), |query| {
            let matching = &matching;
            async move {
                if verify_match(query, document) {
                    matching.lock().push(query.clone());
                }
                Ok(())
            }
        })
        .await?;
        Ok(matching.into_inner())
    }

    /// Sample the document's inverse degree: draw matching queries with
    /// replacement until one's result list carries the document; the number
    /// of draws over the matching-list size is the estimate.
    async fn document_inverse_degree(&self, document: &Data, pool: &[String]) -> CrawlResult<f64> {
        let matching = self.matching_query_list(document, pool).await?;
        if matching.is_empty() {
            // Unreachable through pair selection, which guarantees the
            // selecting query itself matches.
            debug!("document with an empty matching-query list");
            return Ok(0.0);
        }
        let mut draws = 1u64;
        loop {
            let query = &matching[rand::rng().random_range(0..matching.len())];
            let results = match self.crawler.download(query, true, true).await {
                Ok(results) => results,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!(query, %error, "download failed, redrawing");
                    continue;
                }
            };
            if results
                .results()
                .iter()
                .any(|d| d.identifier == document.identifier)
            {
                return Ok(draws as f64 / matching.len() as f64);
            }
            draws += 1;
        }
    }

    /// Documents in the query's result list that really contain the query.
    async fn query_degree(&self, query: &str) -> CrawlResult<u64> {
        let results = self.crawler.download(query, true, true).await?.into_results();
        let count = Mutex::new(0u64);
        execute_in_parallel(self.config.thread_limit, results.iter(), |document| {
            let count = &count;
            async move {
                if verify_match(query, document) {
                    *count.lock() += 1;
                }
                Ok(())
            }
        })
        .await?;
        let count = *count.lock();
        Ok(count)
    }
}

#[async_trait]
impl Estimator for SumEst {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        let pool = read_query_pool(&self.query_pool_path)?;
        let pool_size = self.estimate_pool_size(&pool).await?;
        let mut accumulator = 0.0;
        for iteration in 0..self.config.iterations {
            let (query, document) = self.select_query_document_pair(&pool).await?;
            let inverse_degree = self.document_inverse_degree(&document, &pool).await?;
            let degree = self.query_degree(&query).await?;
            accumulator += pool_size * degree as f64 * inverse_degree;
            report_progress(iteration, self.config.iterations);
        }
        Ok(accumulator / self.config.iterations as f64)
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        vec![
            (
                "Number of iterations".into(),
                self.config.iterations.to_string(),
            ),
            (
                "Size of the query pool sample".into(),
                self.config.pool_sample_size.to_string(),
            ),
            (
                "Query pool file".into(),
                self.query_pool_path.display().to_string(),
            ),
        ]
    }

    fn download_count(&self) -> u64 {
        self.crawler.download_count()
    }
}
