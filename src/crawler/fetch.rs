//! Rendered-page retrieval for scraped engines.
//!
//! The scraping crawler never talks to a browser directly: it asks a
//! [`PageFetcher`] for the rendered HTML of a URL and supplies a readiness
//! predicate (typically "the match-count element is recognisable"). Tests
//! substitute a canned fetcher; production uses Chromium over the DevTools
//! protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CrawlError, CrawlResult};

/// How long to wait for the readiness predicate to accept the rendered DOM.
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Retrieves the rendered HTML of a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url` and return the page HTML once `ready` accepts it.
    ///
    /// Implementations poll the live DOM: dynamic result pages render their
    /// match counts well after the navigation settles.
    async fn fetch_until(
        &self,
        url: &str,
        ready: &(dyn for<'a> Fn(&'a str) -> bool + Sync),
    ) -> CrawlResult<String>;
}

/// Headless-Chromium fetcher. A fresh browser is launched per fetch and torn
/// down afterwards, so a crashed render never poisons later fetches.
#[derive(Debug, Default)]
pub struct ChromiumFetcher;

impl ChromiumFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn fetch_until(
        &self,
        url: &str,
        ready: &(dyn for<'a> Fn(&'a str) -> bool + Sync),
    ) -> CrawlResult<String> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(CrawlError::Browser)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let outcome = render(&browser, url, ready).await;

        if let Err(error) = browser.close().await {
            debug!(%error, "browser close failed");
        }
        let _ = browser.wait().await;
        handler_task.abort();
        outcome
    }
}

async fn render(
    browser: &Browser,
    url: &str,
    ready: &(dyn for<'a> Fn(&'a str) -> bool + Sync),
) -> CrawlResult<String> {
    let page = browser
        .new_page(url)
        .await
        .map_err(|e| CrawlError::Browser(e.to_string()))?;
    page.wait_for_navigation()
        .await
        .map_err(|e| CrawlError::Browser(e.to_string()))?;

    let deadline = Instant::now() + PAGE_LOAD_TIMEOUT;
    loop {
        if let Ok(html) = page.content().await
            && ready(&html)
        {
            return Ok(html);
        }
        if Instant::now() >= deadline {
            return Err(CrawlError::Browser(format!(
                "page did not become ready within {}s: {url}",
                PAGE_LOAD_TIMEOUT.as_secs()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
