//! Random walk over the query/document bipartite graph.
//!
//! A walk step fetches one uniformly drawn document of the current query,
//! then hops to a uniformly drawn word of that document. The words of a
//! document double as its degree in the graph, and revisit frequencies feed
//! a collision-based size estimate. The walk is strictly sequential: each
//! step depends on the document the previous one landed on.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::crawler::CrawlerApi;
use crate::error::CrawlResult;
use crate::query_pool::read_query_pool;
use crate::word_extractor::extract_words;

use super::{Estimator, UNDEFINED_ESTIMATE, begin_run, report_progress};

/// Sampling parameters of the random walk.
#[derive(Debug, Clone)]
pub struct RandomWalkConfig {
    /// Nodes to visit before estimating.
    pub sample_size: usize,
    /// Minimum match count for a pool query to serve as the walk's seed.
    pub min_seed_matches: u64,
    /// Minimum distinct words a visited document must have to count.
    pub min_words: usize,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            sample_size: 5000,
            min_seed_matches: 2,
            min_words: 2,
        }
    }
}

/// Graph-random-walk estimator.
pub struct RandomWalk {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: RandomWalkConfig,
}

impl RandomWalk {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, RandomWalkConfig::default())
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: RandomWalkConfig,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
        }
    }

    /// Pick the next query: a uniform word of the current document when one
    /// is available, otherwise a fresh draw from the pool (also the recovery
    /// path when the walk has nowhere to step back to). Returns the query
    /// together with its match count.
    async fn hop(&self, pool: &[String], words: &[String]) -> CrawlResult<(String, u64)> {
        loop {
            let query = if words.is_empty() {
                pool[rand::rng().random_range(0..pool.len())].clone()
            } else {
                words[rand::rng().random_range(0..words.len())].clone()
            };
            match self.crawler.retrieve_number_matches(&query).await {
                Ok(number_matches) => return Ok((query, number_matches)),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!(query, %error, "match count lookup failed, repicking");
                }
            }
        }
    }

    /// Walk the graph until `sample_size` documents were visited. Fills the
    /// per-visit degree list and the visit counts per document.
    async fn walk(
        &self,
        pool: &[String],
        degrees: &mut Vec<usize>,
        visits: &mut HashMap<String, u64>,
    ) -> CrawlResult<()> {
        // Seed: any pool query with enough matches to walk away from.
        let (mut query, mut number_matches) = loop {
            let candidate = self.hop(pool, &[]).await?;
            if candidate.1 >= self.config.min_seed_matches {
                break candidate;
            }
        };

        let mut words: Vec<String> = Vec::new();
        let mut count = 0;
        while count < self.config.sample_size {
            if number_matches > 0 {
                let index = rand::rng().random_range(0..number_matches);
                let document = match self.crawler.download_item(&query, index).await {
                    Ok(result) => result.results().first().cloned(),
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(error) => {
                        debug!(query, index, %error, "item fetch failed");
                        None
                    }
                };
                let Some(document) = document else {
                    // The engine refused this row; back off to a different
                    // neighbour.
                    (query, number_matches) = self.hop(pool, &words).await?;
                    continue;
                };

                let extracted = extract_words(document.content.as_deref().unwrap_or(""));
                if extracted.len() < self.config.min_words {
                    (query, number_matches) = self.hop(pool, &words).await?;
                    continue;
                }
                words = extracted;
                degrees.push(words.len());
                let id = document.identifier.clone().unwrap_or_default();
                *visits.entry(id).or_insert(0) += 1;
                count += 1;
                report_progress(count, self.config.sample_size);
            }
            (query, number_matches) = self.hop(pool, &words).await?;
        }
        Ok(())
    }
}

/// Collision statistic: Σ C(x, 2) · |{documents visited exactly x times}|
/// over every multiplicity x > 1.
fn collision_count(visits: &HashMap<String, u64>) -> f64 {
    let mut multiplicity: HashMap<u64, u64> = HashMap::new();
    for &times in visits.values() {
        *multiplicity.entry(times).or_insert(0) += 1;
    }
    multiplicity
        .into_iter()
        .filter(|&(times, _)| times > 1)
        .map(|(times, documents)| (times * (times - 1) / 2 * documents) as f64)
        .sum()
}

#[async_trait]
impl Estimator for RandomWalk {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        let pool = read_query_pool(&self.query_pool_path)?;
        let mut degrees: Vec<usize> = Vec::new();
        let mut visits: HashMap<String, u64> = HashMap::new();
        self.walk(&pool, &mut degrees, &mut visits).await?;

        let n = degrees.len() as f64;
        if degrees.len() < 2 {
            return Ok(UNDEFINED_ESTIMATE);
        }
        let mean_degree = degrees.iter().sum::<usize>() as f64 / n;
        let harmonic_degree = n / degrees.iter().map(|&d| 1.0 / d as f64).sum::<f64>();
        let sample_pairs = n * (n - 1.0) / 2.0;
        let collisions = collision_count(&visits);
        if collisions == 0.0 {
            debug!("estimate undefined: the walk never revisited a document");
            return Ok(UNDEFINED_ESTIMATE);
        }
        Ok((mean_degree / harmonic_degree) * sample_pairs / collisions)
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        vec![
            (
                "Random walk sample size".into(),
                self.config.sample_size.to_string(),
            ),
            (
                "Min number of matches for the seed query".into(),
                self.config.min_seed_matches.to_string(),
            ),
            (
                "Min number of words in a visited document".into(),
                self.config.min_words.to_string(),
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
