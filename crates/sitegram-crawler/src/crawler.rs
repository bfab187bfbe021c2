use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use futures::{future, try_join, StreamExt};
use sitegram_text::{ngrams, normalize, NgramOrder, Stopwords};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_stream::wrappers::UnboundedReceiverStream;
use url::Url;

use crate::aggregator::{Aggregator, RankedResult};
use crate::config::{CrawlBudget, CrawlerConfig};
use crate::error::{EngineError, FetchError};
use crate::fetcher::{FetchedPage, PageFetcher};
use crate::frontier::{CountedTx, Frontier};
use crate::origin::SameOrigin;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub ranked: RankedResult,
    /// Pages fetched and aggregated
    pub pages_fetched: usize,
    /// Pages whose fetch failed, they are skipped and never retried
    pub pages_failed: usize,
    /// The drain timeout elapsed, whatever was still in flight is missing
    pub timed_out: bool,
}

/// State shared by the fetch pool and the workers for the length of one run.
struct Run {
    budget: CrawlBudget,
    frontier: Frontier,
    aggregator: Aggregator,
    origin: SameOrigin,
    stopwords: Stopwords,
    pages_out: AtomicUsize,
    fetched: AtomicUsize,
    failed: AtomicUsize,
    stop: AtomicBool,
    /// Held shared while a page is merged, exclusively once `stop` is set
    merging: RwLock<()>,
}

/// Counts one page as out when dropped, panics included.
struct Processed<'a>(&'a AtomicUsize);

impl Drop for Processed<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Run {
    fn dispatch(&self, url: String) -> Option<String> {
        if self.frontier.try_dispatch(&url) {
            log::debug!("Dispatching {url}");
            Some(url)
        } else {
            log::debug!("Discarding {url}");
            self.pages_out.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn skip(&self, url: &str, e: FetchError) {
        log::warn!("Skipping URL {url} got: {e}");
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.pages_out.fetch_add(1, Ordering::SeqCst);
    }

    /// Widens the site to wherever the seed redirected, that location is
    /// marked visited so it isn't fetched a second time.
    fn follow_redirect(&self, requested: &str, page: &FetchedPage) {
        if requested == page.url || requested != self.origin.seed().as_str() {
            return;
        }
        match Url::parse(&page.url) {
            Ok(mut landed) => {
                landed.set_fragment(None);
                self.frontier.mark_visited(landed.as_str());
                if self.origin.follow_redirect(landed) {
                    log::info!("Seed {requested} redirected to {}", page.url);
                }
            }
            Err(e) => log::warn!("Ignoring redirect of {requested} to {}: {e}", page.url),
        }
    }

    fn process(&self, page: FetchedPage, tx_url: &CountedTx) {
        let _processed = Processed(&self.pages_out);
        {
            let _merging = self.merging.read().unwrap_or_else(PoisonError::into_inner);
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            let doc = normalize(&page.text);
            let merged = self
                .aggregator
                .merge(ngrams(&doc, self.budget.order, &self.stopwords));
            self.fetched.fetch_add(1, Ordering::SeqCst);
            log::debug!("Merged {merged} n-grams from {}", page.url);
        }
        self.enqueue_links(&page, tx_url);
    }

    fn enqueue_links(&self, page: &FetchedPage, tx_url: &CountedTx) {
        let mut enqueued = HashSet::new();
        for link in &page.links {
            if enqueued.len() >= self.budget.max_links_per_page || !self.frontier.has_capacity() {
                break;
            }
            let Some(url) = self.origin.filter(link) else {
                continue;
            };
            let url = String::from(url);
            if self.frontier.is_visited(&url) || enqueued.contains(&url) {
                continue;
            }
            tx_url.send(url.clone());
            enqueued.insert(url);
        }
    }
}

async fn fetch_page<F>(
    fetcher: &F,
    url: String,
    fetch_timeout: Duration,
) -> Result<(String, FetchedPage), (String, FetchError)>
where
    F: PageFetcher + ?Sized,
{
    match timeout(fetch_timeout, fetcher.fetch(&url, fetch_timeout)).await {
        Ok(Ok(page)) => Ok((url, page)),
        Ok(Err(e)) => Err((url, e)),
        Err(_) => Err((url, FetchError::Timeout(fetch_timeout))),
    }
}

/// Crawls the site of `seed_url` within `config.budget` and ranks the n-grams
/// of every fetched page.
///
/// The seed goes through the same queue as discovered links. One consumer
/// drains that queue, dispatches unvisited URLs while the page budget lasts,
/// and fetches them with at most `concurrent_fetches` in flight. Fetched pages
/// are handed to `num_workers` threads which normalize and window the text,
/// merge the n-grams into the shared counts, then enqueue up to
/// `max_links_per_page` same-origin links, where the site also covers the
/// location a redirected seed landed on. The run is over once every
/// enqueued URL has been discarded, failed or processed, or once
/// `drain_timeout` elapses.
///
/// Failed fetches only show up in [`CrawlReport::pages_failed`]. Errors are
/// reserved for runs that couldn't happen at all.
pub async fn crawl_site<F>(
    fetcher: &F,
    seed_url: &str,
    config: &CrawlerConfig,
) -> Result<CrawlReport, EngineError>
where
    F: PageFetcher + ?Sized,
{
    config.validate()?;
    let mut seed = Url::parse(seed_url).map_err(|source| EngineError::InvalidSeed {
        url: seed_url.to_string(),
        source,
    })?;
    if !matches!(seed.scheme(), "http" | "https") {
        return Err(EngineError::UnsupportedSeed(seed_url.to_string()));
    }
    seed.set_fragment(None);

    let mut stopwords = Stopwords::portuguese();
    stopwords.extend(&config.extra_stopwords);

    let run = Arc::new(Run {
        budget: config.budget.clone(),
        frontier: Frontier::new(config.budget.max_pages),
        aggregator: Aggregator::new(),
        origin: SameOrigin::new(seed.clone(), config.origin_match),
        stopwords,
        pages_out: AtomicUsize::new(0),
        fetched: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
        stop: AtomicBool::new(false),
        merging: RwLock::new(()),
    });
    let pages_in = Arc::new(AtomicUsize::new(0));

    let (tx_stop, rx_stop) = crossbeam_channel::unbounded::<()>();
    let (tx_url, rx_url) = mpsc::unbounded_channel::<String>();
    let (tx_page, rx_page) = crossbeam_channel::bounded::<FetchedPage>(config.page_buffer);

    let tx_url = CountedTx::new(tx_url, pages_in.clone());

    // Workers

    let mut workers = Vec::with_capacity(config.num_workers);
    for id in 0..config.num_workers {
        let rx_stop = rx_stop.clone();
        let rx_page = rx_page.clone();
        let tx_url = tx_url.clone();
        let run = run.clone();
        let worker = thread::Builder::new()
            .name(format!("sitegram-worker-{id}"))
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(rx_page) -> page => match page {
                        Ok(page) => run.process(page, &tx_url),
                        Err(_) => break,
                    },
                    recv(rx_stop) -> _ => break,
                }
            })
            .map_err(EngineError::WorkerPool)?;
        workers.push(worker);
    }
    drop(rx_page);

    let workers = async move {
        tokio::task::spawn_blocking(move || {
            for w in workers {
                let name = w.thread().name().unwrap_or_default().to_string();
                w.join().map_err(|_| EngineError::WorkerPanicked(name))?;
            }
            Ok::<(), EngineError>(())
        })
        .await?
    };

    // Fetch pool

    let fetch_timeout = config.budget.fetch_timeout();
    let run_c = run.clone();
    let fetch_pool = async move {
        UnboundedReceiverStream::new(rx_url)
            .filter_map(|url| future::ready(run_c.dispatch(url)))
            .map(|url| fetch_page(fetcher, url, fetch_timeout))
            .buffer_unordered(config.concurrent_fetches)
            .for_each(|fetched| {
                match fetched {
                    Ok((url, page)) => {
                        run_c.follow_redirect(&url, &page);
                        if let Err(e) = tx_page.send(page) {
                            log::error!("Couldn't hand page over to workers: {e}");
                            run_c.pages_out.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Err((url, e)) => run_c.skip(&url, e),
                }
                future::ready(())
            })
            .await;
        Ok::<(), EngineError>(())
    };

    // Seed

    tx_url.send(String::from(seed.clone()));
    drop(tx_url);

    // Completion

    let run_c = run.clone();
    let num_workers = config.num_workers;
    let mut handle_sigint = config.handle_sigint;
    let done = async move {
        loop {
            if handle_sigint {
                match timeout(POLL_INTERVAL, tokio::signal::ctrl_c()).await {
                    Ok(Ok(())) => return Err(EngineError::Interrupted),
                    Ok(Err(e)) => {
                        log::warn!("Couldn't listen for Ctrl-C, continuing without it: {e}");
                        handle_sigint = false;
                    }
                    Err(_) => (),
                }
            } else {
                sleep(POLL_INTERVAL).await;
            }
            if run_c.pages_out.load(Ordering::SeqCst) == pages_in.load(Ordering::SeqCst) {
                for _ in 0..num_workers {
                    tx_stop.send(()).ok();
                }
                return Ok::<_, EngineError>(());
            }
        }
    };

    // Run all tasks

    let timed_out = match timeout(config.drain_timeout(), async {
        try_join!(workers, fetch_pool, done)
    })
    .await
    {
        Ok(res) => {
            res?;
            false
        }
        Err(_) => {
            log::warn!(
                "Crawl of {seed} still running after {:?}, returning partial counts",
                config.drain_timeout()
            );
            run.stop.store(true, Ordering::SeqCst);
            // Wait out merges that got past the stop check
            drop(run.merging.write().unwrap_or_else(PoisonError::into_inner));
            true
        }
    };

    let report = CrawlReport {
        ranked: run.aggregator.top_k(config.budget.top_k),
        pages_fetched: run.fetched.load(Ordering::SeqCst),
        pages_failed: run.failed.load(Ordering::SeqCst),
        timed_out,
    };
    log::info!(
        "Crawled {seed}: {} pages fetched, {} failed, {} distinct {}s",
        report.pages_fetched,
        report.pages_failed,
        run.aggregator.len(),
        config.budget.order
    );

    Ok(report)
}

/// Same as [`crawl_site`] with the n-gram order overridden, keeping only the
/// ranking.
pub async fn rank_top_ngrams<F>(
    fetcher: &F,
    seed_url: &str,
    order: NgramOrder,
    config: &CrawlerConfig,
) -> Result<RankedResult, EngineError>
where
    F: PageFetcher + ?Sized,
{
    let mut config = config.clone();
    config.budget.order = order;
    crawl_site(fetcher, seed_url, &config)
        .await
        .map(|report| report.ranked)
}

/// Ranks the n-grams of a single text, no crawling involved.
pub fn rank_text(
    text: &str,
    order: NgramOrder,
    top_k: usize,
    stopwords: &Stopwords,
) -> RankedResult {
    let doc = normalize(text);
    let aggregator = Aggregator::new();
    aggregator.merge(ngrams(&doc, order, stopwords));
    aggregator.top_k(top_k)
}
