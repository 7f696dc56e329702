//! Capped-result estimators (multiple capture–recapture and capture
//! history) on engines with fully overlapping result lists.

mod common;

use std::sync::Arc;

use common::{MockCrawler, doc, write_pool};
use fathom::{Ch, CrawlerApi, Estimator, Mcr, ShokouhiConfig, UNDEFINED_ESTIMATE};

fn config() -> ShokouhiConfig {
    ShokouhiConfig {
        query_sample_size: 5,
        factor_k: 10,
        min_number_matches: 20,
    }
}

/// Five queries, each claiming 25 matches over the same identifier space, so
/// the capped lists are identical.
fn overlapping_engine() -> MockCrawler {
    let rows: Vec<_> = (0..25).map(|i| doc(&format!("r{i}"), "body")).collect();
    let mut crawler = MockCrawler::new();
    for query in ["q0", "q1", "q2", "q3", "q4"] {
        crawler = crawler.with_query(query, rows.clone());
    }
    crawler
}

#[tokio::test]
async fn mcr_counts_pairwise_duplicates_under_the_cap() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["q0", "q1", "q2", "q3", "q4"]);
    let crawler = Arc::new(overlapping_engine());
    let estimator = Mcr::with_config(crawler.clone(), pool, config(), false);

    let estimate = estimator.estimate().await.expect("estimation runs");
    // T = 5 retained lists of 10 identical ids: 10 duplicates over each of
    // the C(5,2) pairs, so T(T-1)K² / (2·100) = 10.
    assert!((estimate - 10.0).abs() < 1e-9, "estimate {estimate}");
    // The estimator clamps the engine to its factor K.
    assert_eq!(crawler.limit_results_per_query(), 10);
}

#[tokio::test]
async fn mcr_without_duplicates_is_undefined() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["q0", "q1"]);
    let crawler = Arc::new(
        MockCrawler::new()
            .with_query("q0", (0..25).map(|i| doc(&format!("a{i}"), "x")).collect())
            .with_query("q1", (0..25).map(|i| doc(&format!("b{i}"), "x")).collect()),
    );
    let estimator = Mcr::with_config(
        crawler,
        pool,
        ShokouhiConfig {
            query_sample_size: 2,
            ..config()
        },
        false,
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    assert_eq!(estimate, UNDEFINED_ESTIMATE);
}

#[tokio::test]
async fn mcr_regression_applies_the_fitted_correction() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["q0", "q1", "q2", "q3", "q4"]);
    let estimator = Mcr::with_config(
        Arc::new(overlapping_engine()),
        pool,
        config(),
        true,
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    let expected = 10f64.powf((10f64.log10() - 1.5767) / 0.5911);
    assert!((estimate - expected).abs() < 1e-9, "estimate {estimate}");
}

#[tokio::test]
async fn ch_accumulates_against_the_marked_history() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["q0", "q1", "q2", "q3", "q4"]);
    let estimator = Ch::with_config(
        Arc::new(overlapping_engine()),
        pool,
        config(),
        false,
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    // Identical capped lists of 10 ids: numerator 10·(100+400+900+1600),
    // denominator 10·(10+20+30+40).
    assert!((estimate - 30.0).abs() < 1e-9, "estimate {estimate}");
}

#[tokio::test]
async fn ch_without_recaptures_is_undefined() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["q0", "q1"]);
    let crawler = Arc::new(
        MockCrawler::new()
            .with_query("q0", (0..25).map(|i| doc(&format!("a{i}"), "x")).collect())
            .with_query("q1", (0..25).map(|i| doc(&format!("b{i}"), "x")).collect()),
    );
    let estimator = Ch::with_config(
        crawler,
        pool,
        ShokouhiConfig {
            query_sample_size: 2,
            ..config()
        },
        false,
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    assert_eq!(estimate, UNDEFINED_ESTIMATE);
}

#[tokio::test]
async fn queries_at_or_below_the_match_floor_are_dropped() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["rare", "q0", "q1", "q2", "q3"]);
    // "rare" claims only 5 matches and must not enter the retained sample.
    let rows: Vec<_> = (0..25).map(|i| doc(&format!("r{i}"), "body")).collect();
    let crawler = Arc::new(
        MockCrawler::new()
            .with_query("rare", vec![doc("r0", "body"); 5])
            .with_query("q0", rows.clone())
            .with_query("q1", rows.clone())
            .with_query("q2", rows.clone())
            .with_query("q3", rows),
    );
    let estimator = Mcr::with_config(crawler, pool, config(), false);

    let estimate = estimator.estimate().await.expect("estimation runs");
    // T = 4 retained lists: 4·3·100 / (2·(10·6)) = 10.
    assert!((estimate - 10.0).abs() < 1e-9, "estimate {estimate}");
}
