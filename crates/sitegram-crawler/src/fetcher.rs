use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::FetchError;

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").unwrap();
    static ref BASE: Selector = Selector::parse("base[href]").unwrap();
    static ref LINKS: Selector = Selector::parse("a[href]").unwrap();
}

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements whose boundaries separate words, text of any other element runs
/// into its neighbours.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// What the crawler needs from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub text: String,
    /// Absolute http(s) URLs, fragment-free, deduplicated, in document order
    pub links: Vec<String>,
}

/// Turns a URL into page text and outbound links.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Default fetcher, `reqwest` for transport and `scraper` for HTML.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .gzip(true)
            .deflate(true)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, FetchError> {
        Self::new(&config.user_agent)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Request(e)
            }
        };

        let resp = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if let Some(content_type) = resp.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.contains("html") && !content_type.starts_with("text/") {
                return Err(FetchError::ContentType(content_type.to_string()));
            }
        }

        // Links resolve against where redirects ended up
        let location = resp.url().clone();
        let body = resp.text().await.map_err(classify)?;
        Ok(extract_page(&body, &location))
    }
}

/// Extracts visible text and outbound links from an HTML document.
pub fn extract_page(html: &str, url: &Url) -> FetchedPage {
    let document = Html::parse_document(html);

    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    let text = visible_text(root);

    let base = document
        .select(&BASE)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| url.join(href.trim()).ok())
        .unwrap_or_else(|| url.clone());

    let mut seen = HashSet::new();
    let links = document
        .select(&LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|link| matches!(link.scheme(), "http" | "https"))
        .map(|mut link| {
            link.set_fragment(None);
            String::from(link)
        })
        .filter(|link| seen.insert(link.clone()))
        .collect();

    FetchedPage {
        url: url.to_string(),
        text,
        links,
    }
}

fn visible_text(root: ElementRef) -> String {
    let mut raw = String::new();
    push_text(root, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Node::Text(text) = child.value() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            push_text(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}
