//! Horvitz–Thompson estimation on a one-query synthetic engine.

mod common;

use std::sync::Arc;

use common::{MockCrawler, doc, write_pool};
use fathom::{Estimator, SumEst, SumEstConfig};

#[tokio::test]
async fn recovers_a_two_document_corpus_behind_a_single_query() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["alpha"]);
    let crawler = Arc::new(MockCrawler::new().with_query(
        "alpha",
        vec![doc("d1", "alpha one"), doc("d2", "alpha two")],
    ));
    let estimator = SumEst::with_config(
        crawler,
        pool,
        SumEstConfig {
            iterations: 3,
            pool_sample_size: 4,
            thread_limit: 2,
        },
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    // Pool coverage 1.0, query degree 2, inverse document degree 1/1: every
    // iteration contributes exactly the corpus size.
    assert!(
        (estimate - 2.0).abs() < 1e-9,
        "estimate {estimate} should be exactly 2"
    );
}

#[tokio::test]
async fn documents_that_fail_the_substring_predicate_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = write_pool(dir.path(), &["alpha", "beta"]);
    // "beta" returns a document that does not actually contain it, so pair
    // selection must keep rejecting it and settle on "alpha".
    let crawler = Arc::new(
        MockCrawler::new()
            .with_query("alpha", vec![doc("d1", "alpha only")])
            .with_query("beta", vec![doc("d9", "unrelated body")]),
    );
    let estimator = SumEst::with_config(
        crawler,
        pool,
        SumEstConfig {
            iterations: 2,
            pool_sample_size: 16,
            thread_limit: 2,
        },
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    // Coverage is sampled with replacement from the two pool queries; the
    // accepted pair always has degree 1 and inverse degree 1, so the
    // estimate is the sampled coverage scaled to the pool.
    assert!((0.0..=2.0 + 1e-9).contains(&estimate), "estimate {estimate} out of range");
}
