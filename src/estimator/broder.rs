//! Importance-weighted sampling estimator.
//!
//! Requires an engine that can serve its entire data set: a uniform document
//! sample measures how much of the corpus the query pool can see at all,
//! while a uniform query sample measures the average importance weight of a
//! query's result list. Matching is the local substring predicate, never a
//! further engine query.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use std::path::PathBuf;
use std::sync::Arc;

use crate::crawler::CrawlerApi;
use crate::data::Data;
use crate::error::CrawlResult;
use crate::parallelizer::execute_in_parallel;
use crate::query_pool::read_query_pool;

use super::{Estimator, UNDEFINED_ESTIMATE, begin_run, report_progress, verify_match};

/// Sample sizes for the importance-weighted estimator.
#[derive(Debug, Clone)]
pub struct BroderConfig {
    pub query_sample_size: usize,
    pub document_sample_size: usize,
    /// Concurrency for the document-visibility count.
    pub thread_limit: usize,
}

impl Default for BroderConfig {
    fn default() -> Self {
        Self {
            query_sample_size: 200,
            document_sample_size: 1000,
            thread_limit: 10,
        }
    }
}

/// Importance-weighted sampling estimator.
pub struct BroderEtAl {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: BroderConfig,
}

impl BroderEtAl {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, BroderConfig::default())
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: BroderConfig,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
        }
    }

    /// Mean importance weight over the query sample: each result document
    /// contributes the reciprocal of its pool degree.
    async fn average_query_weight(
        &self,
        query_sample: &[String],
        pool: &[String],
    ) -> CrawlResult<f64> {
        let weight_sum = Mutex::new(0.0f64);
        execute_in_parallel(
            self.crawler.thread_limit(),
            query_sample.iter(),
            |query| {
                let weight_sum = &weight_sum;
                async move {
                    let results = self.crawler.download(query, true, true).await?;
                    let mut query_weight = 0.0;
                    for document in results.results() {
                        let degree = pool.iter().filter(|q| verify_match(q, document)).count();
                        if degree > 0 {
                            query_weight += 1.0 / degree as f64;
                        }
                    }
                    *weight_sum.lock() += query_weight;
                    Ok(())
                }
            },
        )
        .await?;
        Ok(*weight_sum.lock() / query_sample.len() as f64)
    }

    /// Documents of the sample matched by at least one pool query.
    async fn count_visible(&self, document_sample: &[Data], pool: &[String]) -> CrawlResult<u64> {
        let visible = Mutex::new(0u64);
        execute_in_parallel(self.config.thread_limit, document_sample.iter(), |document| {
            let visible = &visible;
            async move {
                if pool.iter().any(|q| verify_match(q, document)) {
                    *visible.lock() += 1;
                }
                Ok(())
            }
        })
        .await?;
        let count = *visible.lock();
        Ok(count)
    }
}

#[async_trait]
impl Estimator for BroderEtAl {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        let entire_data_set = self.crawler.download_entire_data_set().await?.into_results();
        let document_sample: Vec<Data> = entire_data_set
            .choose_multiple(&mut rand::rng(), self.config.document_sample_size)
            .cloned()
            .collect();
        report_progress(1, 5);

        let pool = read_query_pool(&self.query_pool_path)?;
        report_progress(2, 5);
        let query_sample: Vec<String> = pool
            .choose_multiple(&mut rand::rng(), self.config.query_sample_size)
            .cloned()
            .collect();
        report_progress(3, 5);

        let average_weight = self.average_query_weight(&query_sample, &pool).await?;
        report_progress(4, 5);
        let visible = self.count_visible(&document_sample, &pool).await?;
        report_progress(5, 5);

        if visible == 0 || document_sample.is_empty() {
            return Ok(UNDEFINED_ESTIMATE);
        }
        let matches_entire_pool = average_weight * pool.len() as f64;
        let probability_visible = visible as f64 / document_sample.len() as f64;
        Ok(matches_entire_pool / probability_visible)
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        vec![
            (
                "Query random sample size".into(),
                self.config.query_sample_size.to_string(),
            ),
            (
                "Document random sample size".into(),
                self.config.document_sample_size.to_string(),
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
