use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sitegram_crawler::{
    crawl_site, rank_top_ngrams, CrawlBudget, CrawlerConfig, EngineError, FetchError,
    FetchedPage, NgramOrder, PageFetcher, RankedNgram,
};

enum Fixture {
    Page {
        landed: String,
        text: String,
        links: Vec<String>,
    },
    Missing,
    Hang,
}

/// In-memory site recording every fetch it serves.
#[derive(Default)]
struct Site {
    pages: HashMap<String, Fixture>,
    fetched: Mutex<Vec<String>>,
}

impl Site {
    fn page(self, url: &str, text: &str, links: &[&str]) -> Self {
        self.redirected(url, url, text, links)
    }

    /// A page served from `landed` when `url` is requested.
    fn redirected(mut self, url: &str, landed: &str, text: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            Fixture::Page {
                landed: landed.to_string(),
                text: text.to_string(),
                links: links.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }

    fn missing(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Fixture::Missing);
        self
    }

    fn hanging(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Fixture::Hang);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for Site {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Fixture::Page {
                landed,
                text,
                links,
            }) => Ok(FetchedPage {
                url: landed.clone(),
                text: text.clone(),
                links: links.clone(),
            }),
            Some(Fixture::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(FetchError::Timeout(timeout))
            }
            Some(Fixture::Missing) | None => Err(FetchError::Status(StatusCode::NOT_FOUND)),
        }
    }
}

fn config(max_pages: usize) -> CrawlerConfig {
    CrawlerConfig {
        budget: CrawlBudget {
            max_pages,
            fetch_timeout_ms: 200,
            ..Default::default()
        },
        num_workers: 2,
        handle_sigint: false,
        ..Default::default()
    }
}

const CITIES: [&str; 10] = [
    "Lisboa", "Porto", "Braga", "Coimbra", "Faro", "Aveiro", "Viseu", "Leiria", "Évora", "Guarda",
];

/// Ten same-origin pages, each one linking to all the others.
fn clique() -> Site {
    let urls: Vec<String> = (0..10).map(|i| format!("http://a.com/p{i}")).collect();
    let mut site = Site::default();
    for (i, url) in urls.iter().enumerate() {
        let links: Vec<&str> = urls
            .iter()
            .filter(|other| *other != url)
            .map(String::as_str)
            .collect();
        site = site.page(url, CITIES[i], &links);
    }
    site
}

#[tokio::test]
async fn ranks_unigrams_of_seed_page() {
    let site = Site::default().page(
        "http://a.com/",
        "O Brasil é um país. O Brasil tem praias.",
        &[],
    );

    let report = crawl_site(&site, "http://a.com/", &config(1)).await.unwrap();

    assert_eq!(
        report.ranked.into_vec(),
        vec![
            RankedNgram::new("Brasil", 2),
            RankedNgram::new("país", 1),
            RankedNgram::new("praias", 1),
            RankedNgram::new("tem", 1),
        ]
    );
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.pages_failed, 0);
    assert!(!report.timed_out);

    let mut conf = config(1);
    conf.budget.top_k = 1;
    let top = crawl_site(&site, "http://a.com/", &conf).await.unwrap();
    assert_eq!(top.ranked.into_vec(), vec![RankedNgram::new("Brasil", 2)]);
}

#[tokio::test]
async fn single_page_budget_fetches_only_the_seed() {
    let site = Site::default()
        .page("http://a.com/", "Lisboa Porto", &["http://a.com/a", "http://a.com/b"])
        .page("http://a.com/a", "Braga", &[])
        .page("http://a.com/b", "Faro", &[]);

    let report = crawl_site(&site, "http://a.com/", &config(1)).await.unwrap();

    assert_eq!(site.fetched(), vec!["http://a.com/"]);
    assert_eq!(report.ranked.len(), 2);
}

#[tokio::test]
async fn page_budget_bounds_fetches() {
    let site = clique();
    let mut conf = config(3);
    conf.budget.max_links_per_page = 9;
    conf.concurrent_fetches = 5;

    let report = crawl_site(&site, "http://a.com/p0", &conf).await.unwrap();

    let fetched = site.fetched();
    let distinct: HashSet<_> = fetched.iter().collect();
    assert_eq!(fetched.len(), 3);
    assert_eq!(distinct.len(), 3);
    assert!(fetched.contains(&"http://a.com/p0".to_string()));
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.ranked.len(), 3);
}

#[tokio::test]
async fn link_cap_bounds_links_per_page() {
    let links: Vec<String> = (1..=10).map(|i| format!("http://a.com/{i}")).collect();
    let links: Vec<&str> = links.iter().map(String::as_str).collect();
    let mut site = Site::default().page("http://a.com/", "Lisboa", &links);
    for (link, city) in links.iter().zip(&CITIES) {
        site = site.page(link, city, &[]);
    }
    let mut conf = config(10);
    conf.budget.max_links_per_page = 2;

    let report = crawl_site(&site, "http://a.com/", &conf).await.unwrap();

    let fetched: HashSet<String> = site.fetched().into_iter().collect();
    assert_eq!(
        fetched,
        HashSet::from(["http://a.com/", "http://a.com/1", "http://a.com/2"].map(String::from))
    );
    assert_eq!(site.fetched().len(), 3);
    assert_eq!(report.pages_fetched, 3);
}

#[tokio::test]
async fn links_follow_a_redirected_seed() {
    let site = Site::default()
        .redirected(
            "http://a.com/",
            "https://a.com/",
            "Lisboa",
            &["https://a.com/x", "https://a.com/", "https://b.com/y"],
        )
        .page("https://a.com/x", "Porto", &["http://a.com/z"])
        .page("http://a.com/z", "Braga", &[]);

    let report = crawl_site(&site, "http://a.com/", &config(5)).await.unwrap();

    assert_eq!(
        site.fetched(),
        vec!["http://a.com/", "https://a.com/x", "http://a.com/z"]
    );
    assert_eq!(report.pages_fetched, 3);
}

#[tokio::test]
async fn failed_pages_do_not_abort_the_run() {
    let linked = [
        "http://a.com/1",
        "http://a.com/2",
        "http://a.com/3",
        "http://a.com/4",
        "http://a.com/5",
    ];
    let site = Site::default()
        .page("http://a.com/", "Lisboa", &linked)
        .page("http://a.com/1", "Porto", &[])
        .page("http://a.com/2", "Braga", &[])
        .hanging("http://a.com/3")
        .page("http://a.com/4", "Coimbra", &[])
        .page("http://a.com/5", "Faro", &[]);

    let report = crawl_site(&site, "http://a.com/", &config(6)).await.unwrap();

    assert_eq!(report.pages_fetched, 5);
    assert_eq!(report.pages_failed, 1);
    assert!(!report.timed_out);
    let ngrams: HashSet<_> = report.ranked.iter().map(|r| r.ngram.as_str()).collect();
    assert_eq!(
        ngrams,
        HashSet::from(["Lisboa", "Porto", "Braga", "Coimbra", "Faro"])
    );
}

#[tokio::test]
async fn missing_seed_gives_empty_ranking() {
    let site = Site::default().missing("http://a.com/");

    let report = crawl_site(&site, "http://a.com/", &config(5)).await.unwrap();

    assert!(report.ranked.is_empty());
    assert_eq!(report.pages_fetched, 0);
    assert_eq!(report.pages_failed, 1);
}

#[tokio::test]
async fn ranking_does_not_depend_on_pool_size() {
    let site = || {
        Site::default()
            .page(
                "http://a.com/",
                "Casa Branca e Casa Azul",
                &[
                    "http://a.com/1",
                    "http://a.com/2",
                    "http://a.com/3",
                    "http://a.com/4",
                    "http://a.com/5",
                ],
            )
            .page("http://a.com/1", "Casa Azul de Lisboa", &["http://a.com/2"])
            .page("http://a.com/2", "Casa Branca de Braga", &["http://a.com/1"])
            .page("http://a.com/3", "Porto Alegre e Porto Seguro", &[])
            .page("http://a.com/4", "Porto Seguro tem praias", &[])
            .page("http://a.com/5", "Casa Azul", &[])
    };

    let mut serial = config(6);
    serial.concurrent_fetches = 1;
    serial.num_workers = 1;
    let mut parallel = config(6);
    parallel.concurrent_fetches = 5;
    parallel.num_workers = 4;

    for order in [NgramOrder::Unigram, NgramOrder::Bigram] {
        let a = rank_top_ngrams(&site(), "http://a.com/", order, &serial)
            .await
            .unwrap();
        let b = rank_top_ngrams(&site(), "http://a.com/", order, &parallel)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    let bigrams = rank_top_ngrams(&site(), "http://a.com/", NgramOrder::Bigram, &parallel)
        .await
        .unwrap();
    assert_eq!(bigrams[0], RankedNgram::new("Casa Azul", 3));
}

#[tokio::test]
async fn other_origins_are_not_followed() {
    let site = Site::default()
        .page(
            "http://a.com/",
            "Lisboa",
            &[
                "http://b.com/x",
                "https://a.com/y",
                "http://a.com:8080/z",
                "mailto:someone@a.com",
                "http://a.com/ok",
            ],
        )
        .page("http://a.com/ok", "Porto", &[]);

    let report = crawl_site(&site, "http://a.com/", &config(10)).await.unwrap();

    assert_eq!(site.fetched(), vec!["http://a.com/", "http://a.com/ok"]);
    assert_eq!(report.pages_fetched, 2);
}

#[tokio::test]
async fn duplicate_links_are_fetched_once() {
    let site = Site::default()
        .page(
            "http://a.com/",
            "Lisboa",
            &["http://a.com/a", "http://a.com/a#x", "http://a.com/#top"],
        )
        .page("http://a.com/a", "Porto", &["http://a.com/", "http://a.com/a"]);

    crawl_site(&site, "http://a.com/", &config(10)).await.unwrap();

    assert_eq!(site.fetched(), vec!["http://a.com/", "http://a.com/a"]);
}

#[tokio::test]
async fn drain_timeout_returns_partial_counts() {
    let site = Site::default()
        .page("http://a.com/", "Lisboa", &["http://a.com/slow"])
        .hanging("http://a.com/slow");
    let mut conf = config(5);
    conf.budget.fetch_timeout_ms = 60_000;
    conf.drain_timeout_ms = 300;

    let report = crawl_site(&site, "http://a.com/", &conf).await.unwrap();

    assert!(report.timed_out);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.ranked.into_vec(), vec![RankedNgram::new("Lisboa", 1)]);
}

#[tokio::test]
async fn invalid_runs_are_errors() {
    let site = Site::default();

    let err = crawl_site(&site, "not a url", &config(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidSeed { .. }));

    let err = crawl_site(&site, "ftp://a.com/", &config(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedSeed(_)));

    let err = crawl_site(&site, "http://a.com/", &config(0)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));

    assert!(site.fetched().is_empty());
}
