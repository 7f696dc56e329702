//! Direct-JSON crawler against a local mock HTTP engine.

use mockito::Matcher;

use fathom::{CrawlError, CrawlerApi, SolrCrawler};

fn template(server: &mockito::ServerGuard) -> String {
    format!(
        "{}/solr/experiment/select?q=::FIELD:::::QUERY::&start=::OFFSET::&rows=::LIMIT::\
         &fl=::FIELDS_TO_RETURN::&wt=json",
        server.url()
    )
}

fn body(num_found: u64, docs: &str) -> String {
    format!(r#"{{"response":{{"numFound":{num_found},"docs":[{docs}]}}}}"#)
}

#[tokio::test]
async fn download_maps_the_response_and_counts_one_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "text:relativity".into()),
            Matcher::UrlEncoded("start".into(), "0".into()),
            Matcher::UrlEncoded("rows".into(), "100".into()),
            Matcher::UrlEncoded("fl".into(), "id,text".into()),
        ]))
        .with_body(body(
            2,
            r#"{"id":"d1","text":"general relativity"},{"id":"d2","text":"special relativity"}"#,
        ))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler
        .download("relativity", true, true)
        .await
        .expect("download");
    mock.assert_async().await;
    assert_eq!(result.number_results(), 2);
    assert_eq!(result.results().len(), 2);
    assert_eq!(result.results()[0].identifier.as_deref(), Some("d1"));
    assert_eq!(
        result.results()[1].content.as_deref(),
        Some("special relativity")
    );
    assert_eq!(crawler.download_count(), 1);
}

#[tokio::test]
async fn id_only_downloads_request_just_the_id_field() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::UrlEncoded("fl".into(), "id".into()))
        .with_body(body(1, r#"{"id":"d9"}"#))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler
        .download("anything", true, false)
        .await
        .expect("download");
    mock.assert_async().await;
    assert_eq!(result.results()[0].identifier.as_deref(), Some("d9"));
    assert!(result.results()[0].content.is_none());
}

#[tokio::test]
async fn download_item_carries_the_total_match_count() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "3".into()),
            Matcher::UrlEncoded("rows".into(), "1".into()),
        ]))
        .with_body(body(10, r#"{"id":"d4","text":"fourth"}"#))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler.download_item("query", 3).await.expect("item");
    mock.assert_async().await;
    assert_eq!(result.number_results(), 10);
    assert_eq!(result.results().len(), 1);
}

#[tokio::test]
async fn download_item_past_the_match_count_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/solr/experiment/select")
        .with_body(body(3, r#"{"id":"d1","text":"only"}"#))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler.download_item("query", 7).await;
    assert!(matches!(result, Err(CrawlError::Fatal(_))));
}

#[tokio::test]
async fn entire_data_set_uses_the_wildcard_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::UrlEncoded("q".into(), "*:*".into()))
        .with_body(body(
            2,
            r#"{"id":"d1","text":"one"},{"id":"d2","text":"two"}"#,
        ))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler.download_entire_data_set().await.expect("download");
    mock.assert_async().await;
    assert_eq!(result.results().len(), 2);
}

#[tokio::test]
async fn corpus_size_probe_uses_a_wildcard_count_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "*:*".into()),
            Matcher::UrlEncoded("rows".into(), "1".into()),
        ]))
        .with_body(body(19_994, r#"{"id":"d1"}"#))
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let size = crawler.data_set_size().await.expect("probe succeeds");
    mock.assert_async().await;
    assert_eq!(size, 19_994);
    assert_eq!(crawler.download_count(), 0);
}

#[tokio::test]
async fn persistent_server_errors_become_fatal_after_five_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/solr/experiment/select")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(5)
        .create_async()
        .await;
    let crawler = SolrCrawler::with_limit(template(&server), 100);

    let result = crawler.download("query", true, true).await;
    mock.assert_async().await;
    assert!(matches!(result, Err(CrawlError::Fatal(_))));
    assert_eq!(crawler.download_count(), 0);
}
