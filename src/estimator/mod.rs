//! Corpus-size estimation algorithms.
//!
//! Every estimator samples the engine through a [`CrawlerApi`] handle, never
//! touching the network or the result cache itself. `estimate()` always
//! starts from a clean slate (cache wiped, download counter zeroed) and
//! returns the scalar estimate, or the `-1.0` sentinel when the collected
//! sample leaves the estimate undefined.

pub mod broder;
pub mod mhr;
pub mod random_walk;
pub mod shokouhi;
pub mod sum_est;

use async_trait::async_trait;
use tracing::info;

use crate::crawler::CrawlerApi;
use crate::data::Data;
use crate::error::CrawlResult;

pub use broder::{BroderConfig, BroderEtAl};
pub use mhr::{Mhr, MhrConfig, TeacherMhr};
pub use random_walk::{RandomWalk, RandomWalkConfig};
pub use shokouhi::{Ch, Mcr, ShokouhiConfig};
pub use sum_est::{SumEst, SumEstConfig};

/// Sentinel returned when the sample admits no estimate.
pub const UNDEFINED_ESTIMATE: f64 = -1.0;

/// A corpus-size estimation algorithm bound to one crawler.
#[async_trait]
pub trait Estimator: Send + Sync {
    /// Run the algorithm once and return the estimated corpus size, or
    /// [`UNDEFINED_ESTIMATE`] when the sample was insufficient.
    async fn estimate(&self) -> CrawlResult<f64>;

    /// Human-readable parameter names and values, for the experiment log.
    fn experiment_details(&self) -> Vec<(String, String)>;

    /// Engine round-trips performed so far, read through to the crawler.
    fn download_count(&self) -> u64;
}

/// Reset crawler-side state at the start of an estimation run.
pub(crate) fn begin_run(crawler: &dyn CrawlerApi) {
    crawler.wipe_cache();
    crawler.reset_download_count();
}

pub(crate) fn report_progress(progress: usize, total: usize) {
    info!(progress, total, "sampling progress");
}

/// Local matching predicate: a query matches a document when it occurs as a
/// case-insensitive substring of the document content.
pub(crate) fn verify_match(query: &str, document: &Data) -> bool {
    document
        .content
        .as_deref()
        .is_some_and(|content| content.to_lowercase().contains(&query.to_lowercase()))
}
