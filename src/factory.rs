//! Wires experiment names to ready-to-run component bundles.
//!
//! An experiment name such as `solr-mhr` or `portal-random-walk` picks an
//! engine and an algorithm; the factory builds the crawler, binds the
//! estimator to it, and points a logger at the experiment's log files. The
//! executor treats the bundle as opaque.

use std::path::PathBuf;
use std::sync::Arc;

use crate::crawler::{ChromiumFetcher, CrawlerApi, ExploreSite, PortalSite, SolrCrawler, WebsiteCrawler};
use crate::error::{CrawlError, CrawlResult};
use crate::estimator::{BroderEtAl, Ch, Estimator, Mcr, Mhr, RandomWalk, SumEst, TeacherMhr};
use crate::logger::{CsvLogger, ExperimentLogger};

/// Paths and endpoints the experiments run against.
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Masked URL template of the direct-JSON engine.
    pub solr_url_template: String,
    pub query_pool_path: PathBuf,
    /// Root of the per-engine result caches.
    pub data_dir: PathBuf,
    /// Root of the per-experiment log files.
    pub log_dir: PathBuf,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            solr_url_template: "http://localhost:8984/solr/experiment/select?\
                 q=::FIELD:::::QUERY::&start=::OFFSET::&rows=::LIMIT::\
                 &fl=::FIELDS_TO_RETURN::&wt=json"
                .to_string(),
            query_pool_path: PathBuf::from("WordLists/pool.txt"),
            data_dir: PathBuf::from("Data"),
            log_dir: PathBuf::from("Logs"),
        }
    }
}

/// A fully wired experiment.
pub struct ExperimentBundle {
    pub estimator: Arc<dyn Estimator>,
    pub crawler: Arc<dyn CrawlerApi>,
    pub logger: Box<dyn ExperimentLogger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Solr,
    Explore,
    Portal,
}

impl Engine {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "solr" => Some(Self::Solr),
            "explore" => Some(Self::Explore),
            "portal" => Some(Self::Portal),
            _ => None,
        }
    }

    /// Corpus sizes measured once per engine; the logger uses them to report
    /// relative errors.
    fn known_corpus_size(self) -> u64 {
        match self {
            Self::Solr => 19_994,
            Self::Explore => 3_707_749,
            Self::Portal => 446_154,
        }
    }
}

fn build_crawler(engine: Engine, config: &FactoryConfig) -> CrawlResult<Arc<dyn CrawlerApi>> {
    Ok(match engine {
        Engine::Solr => Arc::new(SolrCrawler::new(config.solr_url_template.clone())),
        Engine::Explore => Arc::new(WebsiteCrawler::new(
            ExploreSite::all_fields(),
            Arc::new(ChromiumFetcher::new()),
            config.data_dir.join("explore"),
        )?),
        Engine::Portal => Arc::new(WebsiteCrawler::new(
            PortalSite::all_fields(),
            Arc::new(ChromiumFetcher::new()),
            config.data_dir.join("portal"),
        )?),
    })
}

fn build_estimator(
    algorithm: &str,
    crawler: Arc<dyn CrawlerApi>,
    pool: PathBuf,
) -> Option<Arc<dyn Estimator>> {
    Some(match algorithm {
        "mhr" => Arc::new(Mhr::new(crawler, pool)),
        "exact-mhr" => Arc::new(Mhr::exact(crawler, pool)),
        "teacher-mhr" => Arc::new(TeacherMhr::new(crawler, pool)),
        "random-walk" => Arc::new(RandomWalk::new(crawler, pool)),
        "broder" => Arc::new(BroderEtAl::new(crawler, pool)),
        "sum-est" => Arc::new(SumEst::new(crawler, pool)),
        "mcr" => Arc::new(Mcr::new(crawler, pool)),
        "mcr-reg" => Arc::new(Mcr::regressed(crawler, pool)),
        "ch" => Arc::new(Ch::new(crawler, pool)),
        "ch-reg" => Arc::new(Ch::regressed(crawler, pool)),
        _ => return None,
    })
}

/// Build the bundle for `experiment`, named `<engine>-<algorithm>` (for
/// example `solr-mhr`, `explore-random-walk`, `portal-ch-reg`).
pub fn build(experiment: &str, config: &FactoryConfig) -> CrawlResult<ExperimentBundle> {
    let (engine_token, algorithm) = experiment
        .split_once('-')
        .ok_or_else(|| CrawlError::fatal(format!("unknown experiment \"{experiment}\"")))?;
    let engine = Engine::parse(engine_token)
        .ok_or_else(|| CrawlError::fatal(format!("unknown engine \"{engine_token}\"")))?;
    let crawler = build_crawler(engine, config)?;
    let estimator = build_estimator(
        algorithm,
        crawler.clone(),
        config.query_pool_path.clone(),
    )
    .ok_or_else(|| CrawlError::fatal(format!("unknown algorithm \"{algorithm}\"")))?;

    let log_dir = config.log_dir.join(experiment);
    let logger = Box::new(CsvLogger::new(
        log_dir.join("Log.txt"),
        log_dir.join("Results.csv"),
        engine.known_corpus_size(),
        crawler.limit_results_per_query(),
    ));
    Ok(ExperimentBundle {
        estimator,
        crawler,
        logger,
    })
}
