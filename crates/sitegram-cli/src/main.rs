use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use sitegram_crawler::{
    crawl_site, extract_page, rank_text, CrawlerConfig, HttpFetcher, NgramOrder, OriginMatch,
    PageFetcher, Stopwords,
};
use tokio::runtime;
use url::Url;

mod output;

use crate::output::{write_ranking, OutputArgs};

/// Site n-gram ranker
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "page")]
    Page(PageArgs),
    #[command(hide = true)]
    Completion,
}

/// Crawl a site from a seed page and rank its most frequent n-grams
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Seed URL, only links of the same site are followed
    pub url: String,
    /// Optional default crawler yaml configuration file
    #[arg(env = "SITEGRAM_CONFIG", long)]
    pub config: Option<PathBuf>,
    /// Override n-gram order
    #[arg(value_enum, long, short)]
    pub order: Option<NgramOrder>,
    /// Override maximum number of pages fetched
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Override maximum number of links followed per page
    #[arg(long)]
    pub max_links: Option<usize>,
    /// Override per page fetch timeout, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Override number of n-grams reported
    #[arg(long)]
    pub top: Option<usize>,
    /// Override crawler's maximum concurrent page downloads
    #[arg(long)]
    pub concurrent_fetches: Option<usize>,
    /// Override crawler's number of CPU workers used to count n-grams
    #[arg(long)]
    pub num_workers: Option<usize>,
    /// Override how links are matched against the seed's site
    #[arg(value_enum, long)]
    pub origin_match: Option<OriginMatch>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Additional stopword, can be repeated
    #[arg(long = "stopword")]
    pub stopwords: Vec<String>,
    /// No SIGINT handling
    #[arg(long)]
    pub no_sigint: bool,
    #[command(flatten)]
    pub output: OutputArgs,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
    /// Log a summary of the run
    #[arg(long, short, conflicts_with = "quiet")]
    pub verbose: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(path) = &args.config {
            serde_yaml::from_reader(fs_err::File::open(path)?)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(order) = args.order {
            conf.budget.order = order;
        }
        if let Some(max_pages) = args.max_pages {
            conf.budget.max_pages = max_pages;
        }
        if let Some(max_links) = args.max_links {
            conf.budget.max_links_per_page = max_links;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            conf.budget.fetch_timeout_ms = timeout_ms;
        }
        if let Some(top) = args.top {
            conf.budget.top_k = top;
        }
        if let Some(concurrent_fetches) = args.concurrent_fetches {
            conf.concurrent_fetches = concurrent_fetches;
        }
        if let Some(num_workers) = args.num_workers {
            conf.num_workers = num_workers;
        }
        if let Some(origin_match) = args.origin_match {
            conf.origin_match = origin_match;
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        conf.extra_stopwords.extend(args.stopwords.iter().cloned());
        if args.no_sigint {
            conf.handle_sigint = false;
        }
        Ok(conf)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let crawler_conf: CrawlerConfig = (&args).try_into()?;
    let fetcher = HttpFetcher::from_config(&crawler_conf)?;
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(crawl_site(&fetcher, &args.url, &crawler_conf))?;

    if !args.quiet {
        eprintln!(
            "{} pages fetched, {} failed{}",
            report.pages_fetched,
            report.pages_failed,
            if report.timed_out { ", timed out" } else { "" }
        );
    }
    write_ranking(args.output.open()?, args.output.format, &report.ranked)
}

/// Rank the n-grams of a single page, without following links
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct PageArgs {
    /// A local html page
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// N-gram order
    #[arg(value_enum, long, short, default_value = "1")]
    pub order: NgramOrder,
    /// Number of n-grams reported
    #[arg(long, default_value_t = 20)]
    pub top: usize,
    /// Additional stopword, can be repeated
    #[arg(long = "stopword")]
    pub stopwords: Vec<String>,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with = "file")]
    pub ua: Option<String>,
    /// Download timeout, in milliseconds
    #[arg(long, default_value_t = 5_000, conflicts_with = "file")]
    pub timeout_ms: u64,
    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn page(args: PageArgs) -> anyhow::Result<()> {
    let text = if let Some(url) = &args.url {
        let ua = args
            .ua
            .clone()
            .unwrap_or_else(|| CrawlerConfig::default().user_agent);
        let fetcher = HttpFetcher::new(&ua)?;
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        let timeout = Duration::from_millis(args.timeout_ms);
        rt.block_on(fetcher.fetch(url, timeout))?.text
    } else if let Some(path) = &args.file {
        let html = fs_err::read_to_string(path)?;
        let location = Url::from_file_path(fs_err::canonicalize(path)?)
            .map_err(|_| anyhow!("Couldn't turn {} into a file URL", path.display()))?;
        extract_page(&html, &location).text
    } else {
        anyhow::bail!("Missing `url` or `file`");
    };

    let mut stopwords = Stopwords::portuguese();
    stopwords.extend(&args.stopwords);
    let ranked = rank_text(&text, args.order, args.top, &stopwords);
    write_ranking(args.output.open()?, args.output.format, &ranked)
}

fn init_logs(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                let level = if args.verbose { "info" } else { "warn" };
                init_logs(&format!("sitegram_crawler={level}"));
            }
            crawl(args)
        }
        SubCommand::Page(args) => {
            init_logs("sitegram_crawler=warn");
            page(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "sitegram", &mut io::stdout());
            Ok(())
        }
    }
}
