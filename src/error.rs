//! Error types shared by the crawler and estimator layers.
//!
//! The crawler is the sole injector of fatal errors from the network and
//! scrape paths. Sampling loops are allowed to retry a step on a transient
//! error; a [`CrawlError::Fatal`] aborts the whole run and is observed by
//! whoever drives `estimate()`.

use thiserror::Error;

/// Convenience alias for results in the crawl/estimation path.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Error type for crawl and estimation operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Unrecoverable condition: retries exhausted, extraction failure on a
    /// scraped page, index out of range, unsupported operation. Aborts the
    /// estimation run.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Transient transport failure. Sampling loops may retry the same step.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A fetched page or response body could not be interpreted.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Browser-side failure while rendering a page.
    #[error("browser: {0}")]
    Browser(String),

    /// Filesystem failure in the result cache or query pool.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Build a fatal error from any displayable message.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether this error must abort the estimation run instead of being
    /// retried by the sampling loop that observed it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
