//! Importance-weighted sampling on a fully covered synthetic corpus.

mod common;

use std::sync::Arc;

use common::{MockCrawler, doc};
use fathom::{BroderConfig, BroderEtAl, CrawlError, Data, Estimator};

/// 1000 documents split into 100 disjoint groups of 10; the pool query
/// `termNN` matches exactly the documents of group NN.
fn disjoint_corpus() -> (MockCrawler, Vec<String>) {
    let mut documents: Vec<Data> = Vec::new();
    let mut crawler = MockCrawler::new();
    let mut pool = Vec::new();
    for group in 0..100 {
        let term = format!("term{group:02}");
        let group_docs: Vec<Data> = (0..10)
            .map(|member| doc(&format!("doc-{group}-{member}"), &term))
            .collect();
        documents.extend(group_docs.clone());
        crawler = crawler.with_query(&term, group_docs);
        pool.push(term);
    }
    (crawler.with_entire_data_set(documents), pool)
}

#[tokio::test]
async fn recovers_the_exact_size_of_a_disjoint_corpus() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (crawler, pool) = disjoint_corpus();
    let pool_path = dir.path().join("pool.txt");
    std::fs::write(&pool_path, pool.join("\n")).expect("pool file writes");
    let estimator = BroderEtAl::with_config(
        Arc::new(crawler),
        pool_path,
        BroderConfig {
            query_sample_size: 20,
            document_sample_size: 100,
            thread_limit: 10,
        },
    );

    let estimate = estimator.estimate().await.expect("estimation runs");
    // Every query weighs 10 (ten result documents of pool degree one) and
    // every document is visible, so the estimate is exact.
    assert!(
        (estimate - 1000.0).abs() < 1e-9,
        "estimate {estimate} should be exactly 1000"
    );
}

#[tokio::test]
async fn engines_without_full_export_abort_fatally() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool_path = dir.path().join("pool.txt");
    std::fs::write(&pool_path, "alpha\n").expect("pool file writes");
    let estimator = BroderEtAl::new(Arc::new(MockCrawler::new()), pool_path);

    let result = estimator.estimate().await;
    assert!(matches!(result, Err(CrawlError::Fatal(_))));
}
