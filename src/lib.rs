//! Estimates the size of a searchable corpus that is only reachable through
//! a black-box query interface with a per-query result cap.
//!
//! The estimators sample the engine through the [`crawler::CrawlerApi`]
//! abstraction; scraped engines assemble complete results page by page and
//! keep them in a per-query on-disk cache so interrupted runs resume where
//! they stopped.

pub mod cache;
pub mod crawler;
pub mod data;
pub mod error;
pub mod estimator;
pub mod executor;
pub mod factory;
pub mod logger;
pub mod parallelizer;
pub mod query_pool;
pub mod word_extractor;

pub use cache::ResultCache;
pub use crawler::{
    ChromiumFetcher, CrawlerApi, DownloadCounter, ExploreSite, PageFetcher, PortalSite,
    SiteRules, SolrCrawler, WebsiteCrawler,
};
pub use data::{Data, SearchResult};
pub use error::{CrawlError, CrawlResult};
pub use estimator::{
    BroderConfig, BroderEtAl, Ch, Estimator, Mcr, Mhr, MhrConfig, RandomWalk, RandomWalkConfig,
    ShokouhiConfig, SumEst, SumEstConfig, TeacherMhr, UNDEFINED_ESTIMATE,
};
pub use executor::Executor;
pub use factory::{ExperimentBundle, FactoryConfig, build as build_experiment};
pub use logger::{CsvLogger, ExperimentLogger};
pub use parallelizer::execute_in_parallel;
pub use query_pool::{ShuffledPool, read_query_pool};
pub use word_extractor::extract_words;
