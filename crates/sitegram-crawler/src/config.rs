use std::cmp;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitegram_text::NgramOrder;

use crate::error::EngineError;
use crate::origin::OriginMatch;

/// Per-run limits. Every bound the engine honors lives here so that small
/// budgets can be used in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlBudget {
    /// Maximum number of fetches dispatched in one run
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum number of new same-origin links enqueued from one page
    #[serde(default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default)]
    pub order: NgramOrder,

    /// Result cap
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl CrawlBudget {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_links_per_page: default_max_links_per_page(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            order: NgramOrder::default(),
            top_k: default_top_k(),
        }
    }
}

fn default_max_pages() -> usize {
    5
}

fn default_max_links_per_page() -> usize {
    5
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_top_k() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(flatten)]
    pub budget: CrawlBudget,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Size of the fetch pool of one run
    #[serde(default = "default_concurrent_fetches")]
    pub concurrent_fetches: usize,

    /// Number of threads turning fetched pages into n-gram counts
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    #[serde(default = "default_page_buffer")]
    pub page_buffer: usize,

    /// Upper bound on the whole run, in-flight work is dropped past it
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default)]
    pub origin_match: OriginMatch,

    #[serde(default)]
    pub extra_stopwords: Vec<String>,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl CrawlerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.budget.max_pages == 0 {
            return Err(EngineError::InvalidConfig("maxPages must be at least 1".into()));
        }
        if self.concurrent_fetches == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrentFetches must be at least 1".into(),
            ));
        }
        if self.num_workers == 0 {
            return Err(EngineError::InvalidConfig("numWorkers must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            budget: CrawlBudget::default(),
            user_agent: default_user_agent(),
            concurrent_fetches: default_concurrent_fetches(),
            num_workers: default_num_workers(),
            page_buffer: default_page_buffer(),
            drain_timeout_ms: default_drain_timeout_ms(),
            origin_match: OriginMatch::default(),
            extra_stopwords: Vec::new(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

fn default_user_agent() -> String {
    String::from("SitegramBot")
}

fn default_concurrent_fetches() -> usize {
    5
}

fn default_num_workers() -> usize {
    cmp::max(1, num_cpus::get().saturating_sub(2))
}

fn default_page_buffer() -> usize {
    1_000
}

fn default_drain_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

fn default_handle_sigint() -> bool {
    true
}
