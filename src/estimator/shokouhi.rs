//! Multiple capture–recapture and capture-history estimators with a capped
//! result factor, plus their log-regressed corrections.
//!
//! Both estimators clamp the engine to K results per query, sample the pool,
//! and keep only queries that returned more than a minimum match count. MCR
//! counts pairwise duplicate identifiers across the retained result lists;
//! CH walks the lists once, accumulating against the running set of marked
//! identifiers.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::crawler::CrawlerApi;
use crate::data::Data;
use crate::error::CrawlResult;
use crate::query_pool::read_query_pool;

use super::{Estimator, UNDEFINED_ESTIMATE, begin_run};

/// Log-linear correction constants fitted for the MCR estimator.
const MCR_REGRESSION: (f64, f64) = (1.5767, 0.5911);
/// Log-linear correction constants fitted for the CH estimator.
const CH_REGRESSION: (f64, f64) = (1.4208, 0.6429);

/// Shared sampling parameters of the capped-result estimators.
#[derive(Debug, Clone)]
pub struct ShokouhiConfig {
    pub query_sample_size: usize,
    /// Result cap K imposed on the engine while sampling.
    pub factor_k: u64,
    /// Queries must return strictly more matches than this to be retained.
    pub min_number_matches: u64,
}

impl Default for ShokouhiConfig {
    fn default() -> Self {
        Self {
            query_sample_size: 5000,
            factor_k: 10,
            min_number_matches: 20,
        }
    }
}

impl ShokouhiConfig {
    fn details(&self, query_pool_path: &PathBuf) -> Vec<(String, String)> {
        vec![
            (
                "Query sample size".into(),
                self.query_sample_size.to_string(),
            ),
            ("Factor K".into(), self.factor_k.to_string()),
            (
                "Min number of matches for retained queries".into(),
                self.min_number_matches.to_string(),
            ),
            (
                "Query pool file".into(),
                query_pool_path.display().to_string(),
            ),
        ]
    }
}

/// Clamp the engine to K and collect the retained result lists.
async fn collect_capped_samples(
    crawler: &dyn CrawlerApi,
    query_pool_path: &PathBuf,
    config: &ShokouhiConfig,
) -> CrawlResult<Vec<Vec<Data>>> {
    crawler.set_limit_results_per_query(config.factor_k);
    let pool = read_query_pool(query_pool_path)?;
    let sample: Vec<String> = pool
        .choose_multiple(&mut rand::rng(), config.query_sample_size)
        .cloned()
        .collect();
    let mut retained = Vec::new();
    for query in &sample {
        let result = crawler.download(query, true, false).await?;
        if result.number_results() > config.min_number_matches {
            retained.push(result.into_results());
        }
    }
    Ok(retained)
}

/// Identifiers of `first` also present in `second`, counted with `first`'s
/// multiplicity.
fn count_duplicates(first: &[Data], second: &[Data]) -> u64 {
    let second_ids: HashSet<&str> = second
        .iter()
        .filter_map(|d| d.identifier.as_deref())
        .collect();
    first
        .iter()
        .filter_map(|d| d.identifier.as_deref())
        .filter(|id| second_ids.contains(id))
        .count() as u64
}

fn log_regress(raw: f64, constants: (f64, f64)) -> f64 {
    if raw <= 0.0 {
        return raw;
    }
    let (a, b) = constants;
    10f64.powf((raw.log10() - a) / b)
}

/// Multiple capture–recapture under a result cap.
pub struct Mcr {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: ShokouhiConfig,
    regressed: bool,
}

impl Mcr {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, ShokouhiConfig::default(), false)
    }

    /// Variant applying the fitted log-linear correction to the raw estimate.
    pub fn regressed(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, ShokouhiConfig::default(), true)
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: ShokouhiConfig,
        regressed: bool,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
            regressed,
        }
    }
}

#[async_trait]
impl Estimator for Mcr {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        let samples =
            collect_capped_samples(self.crawler.as_ref(), &self.query_pool_path, &self.config)
                .await?;
        let t = samples.len() as f64;
        let mut duplicates = 0u64;
        for (i, first) in samples.iter().enumerate() {
            for second in &samples[i + 1..] {
                duplicates += count_duplicates(first, second);
            }
        }
        if duplicates == 0 {
            return Ok(UNDEFINED_ESTIMATE);
        }
        let k = self.config.factor_k as f64;
        let raw = t * (t - 1.0) * k * k / (2.0 * duplicates as f64);
        Ok(if self.regressed {
            log_regress(raw, MCR_REGRESSION)
        } else {
            raw
        })
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        self.config.details(&self.query_pool_path)
    }

    fn download_count(&self) -> u64 {
        self.crawler.download_count()
    }
}

/// Capture-history estimator under a result cap.
pub struct Ch {
    crawler: Arc<dyn CrawlerApi>,
    query_pool_path: PathBuf,
    config: ShokouhiConfig,
    regressed: bool,
}

impl Ch {
    pub fn new(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, ShokouhiConfig::default(), false)
    }

    /// Variant applying the fitted log-linear correction to the raw estimate.
    pub fn regressed(crawler: Arc<dyn CrawlerApi>, query_pool_path: impl Into<PathBuf>) -> Self {
        Self::with_config(crawler, query_pool_path, ShokouhiConfig::default(), true)
    }

    pub fn with_config(
        crawler: Arc<dyn CrawlerApi>,
        query_pool_path: impl Into<PathBuf>,
        config: ShokouhiConfig,
        regressed: bool,
    ) -> Self {
        Self {
            crawler,
            query_pool_path: query_pool_path.into(),
            config,
            regressed,
        }
    }
}

#[async_trait]
impl Estimator for Ch {
    async fn estimate(&self) -> CrawlResult<f64> {
        begin_run(self.crawler.as_ref());
        let samples =
            collect_capped_samples(self.crawler.as_ref(), &self.query_pool_path, &self.config)
                .await?;
        let k = self.config.factor_k as f64;
        let mut marked_ids: HashSet<String> = HashSet::new();
        // Marked count keeps list semantics: duplicates accumulate.
        let mut marked_len = 0u64;
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for sample in &samples {
            numerator += k * (marked_len * marked_len) as f64;
            let ids: Vec<&str> = sample
                .iter()
                .filter_map(|d| d.identifier.as_deref())
                .collect();
            let recaptured = ids.iter().filter(|id| marked_ids.contains(**id)).count() as u64;
            denominator += (recaptured * marked_len) as f64;
            for id in ids {
                marked_ids.insert(id.to_string());
                marked_len += 1;
            }
        }
        if denominator == 0.0 {
            return Ok(UNDEFINED_ESTIMATE);
        }
        let raw = numerator / denominator;
        Ok(if self.regressed {
            log_regress(raw, CH_REGRESSION)
        } else {
            raw
        })
    }

    fn experiment_details(&self) -> Vec<(String, String)> {
        self.config.details(&self.query_pool_path)
    }

    fn download_count(&self) -> u64 {
        self.crawler.download_count()
    }
}
