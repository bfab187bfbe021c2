mod aggregator;
mod config;
mod crawler;
mod error;
mod fetcher;
mod frontier;
mod origin;

pub use aggregator::{Aggregator, RankedNgram, RankedResult};
pub use config::{CrawlBudget, CrawlerConfig};
pub use crawler::{crawl_site, rank_text, rank_top_ngrams, CrawlReport};
pub use error::{EngineError, FetchError};
pub use fetcher::{extract_page, FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::{CountedTx, Frontier};
pub use origin::{same_origin, OriginMatch, SameOrigin};

pub use sitegram_text::{NgramOrder, Stopwords};
