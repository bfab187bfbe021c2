use std::io;
use std::time::Duration;

use reqwest::StatusCode;

/// Failure to fetch one page. Never aborts a crawl: the page is logged,
/// counted in the report and skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("unsupported content type {0}")]
    ContentType(String),
}

/// Failure of a whole crawl run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid seed URL {url}: {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("seed URL {0} is not http(s)")]
    UnsupportedSeed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("couldn't start worker pool: {0}")]
    WorkerPool(#[source] io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(String),

    #[error("couldn't join worker pool: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("crawl interrupted")]
    Interrupted,
}
