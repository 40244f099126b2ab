//! scholar-crawler - directive-driven academic literature crawler
//!
//! ## Usage
//!
//! ```bash
//! scholar-crawler --input search_plan.md --max-results 20 --output-dir out/
//! scholar-crawler -q "graph neural networks" "message passing" --no-fallback
//! scholar-crawler --input search_plan.md --test-mode
//! ```

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{ArgGroup, Parser};
use scholar_crawler::{
    config::{resolve_api_key, CrawlerConfig, DelayRange, FallbackPolicy, PacingConfig},
    cookies::CookieJar,
    directive::Directive,
    export,
    gscholar::ScholarScraper,
    parser,
    pipeline::Crawler,
    provider::PaperSearch,
    semanticscholar::SemanticScholarClient,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Academic literature crawler for SEED and QUERY directives
#[derive(Parser)]
#[command(name = "scholar-crawler")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "queries"])))]
struct Cli {
    /// Search plan file to extract directives from
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Search queries, each run as a QUERY directive
    #[arg(short, long, num_args = 1..)]
    queries: Vec<String>,

    /// Maximum results per directive
    #[arg(short, long, default_value_t = scholar_crawler::config::DEFAULT_MAX_RESULTS)]
    max_results: usize,

    /// Output directory
    #[arg(short, long, default_value = "./")]
    output_dir: PathBuf,

    /// Minimum delay before Semantic Scholar requests (seconds)
    #[arg(long, default_value_t = 1.1)]
    delay_min: f64,

    /// Maximum delay before Semantic Scholar requests (seconds)
    #[arg(long, default_value_t = 1.1)]
    delay_max: f64,

    /// Parse and list directives without searching
    #[arg(long)]
    test_mode: bool,

    /// Use Google Scholar only for QUERY directives
    #[arg(long, conflicts_with = "no_fallback")]
    google_only: bool,

    /// Never fall back to Google Scholar
    #[arg(long)]
    no_fallback: bool,

    /// Semantic Scholar API key (else SEMANTIC_SCHOLAR_API_KEY or config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Sort for directives without a SORT tag
    #[arg(long, value_parser = ["relevance", "citationCount:desc", "citationCount:asc", "year:desc", "year:asc"])]
    sort_by: Option<String>,

    /// Match queries against titles only
    #[arg(long)]
    exact_title: bool,

    /// JSON config file holding `semantic_scholar_api_key`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Google Scholar cookie file (default: ~/.scholar_crawler_cookies.json)
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Proxy URL for Google Scholar (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn fallback_policy(&self) -> FallbackPolicy {
        if self.google_only {
            FallbackPolicy::SecondaryOnly
        } else if self.no_fallback {
            FallbackPolicy::Disabled
        } else {
            FallbackPolicy::Auto
        }
    }

    fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            api_key: resolve_api_key(self.api_key.as_deref(), self.config.as_deref()),
            max_results: self.max_results,
            output_dir: self.output_dir.clone(),
            pacing: PacingConfig {
                primary: DelayRange::new(self.delay_min, self.delay_max),
                ..Default::default()
            },
            fallback: self.fallback_policy(),
            exact_title: self.exact_title,
            sort_override: self.sort_by.clone(),
            cookie_path: self.cookies.clone(),
        }
    }

    fn directives(&self) -> Result<(Vec<Directive>, String)> {
        if let Some(path) = &self.input {
            if !path.exists() {
                bail!("Input file not found: {}", path.display());
            }
            let directives = parser::read_directives(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if directives.is_empty() {
                bail!("No directives found in {}", path.display());
            }
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok((directives, source));
        }

        let directives = self
            .queries
            .iter()
            .enumerate()
            .map(|(i, q)| Directive::query(q.trim(), None, i as u32 + 1))
            .collect();
        Ok((directives, "command line".to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    let (directives, source) = cli.directives()?;
    info!(count = directives.len(), source = %source, "Loaded directives");

    if cli.test_mode {
        print_test_mode(&directives, cli.max_results);
        return Ok(());
    }

    let config = cli.crawler_config();
    config.validate().context("Invalid configuration")?;
    if config.api_key.is_none() {
        warn!("No Semantic Scholar API key, using the shared rate limit");
    }

    let client = SemanticScholarClient::new(config.api_key.clone(), config.pacing.primary)
        .context("Failed to create Semantic Scholar client")?;
    let scraper = build_scraper(&cli, &config);
    let secondary = scraper.as_ref().map(|s| s as &dyn PaperSearch);

    let crawler = Crawler::new(&config, &client, &client, secondary);
    let papers = crawler.run(&directives).await;
    info!(total = papers.len(), "Total papers collected");

    let timestamp = Local::now();
    let stamp = timestamp.format("%Y%m%d_%H%M%S").to_string();
    let csv_path = config
        .output_dir
        .join(format!("literature_review_{}.csv", stamp));
    let report_path = config.output_dir.join(format!("crawler_report_{}.md", stamp));

    let csv_file = export::write_csv(&papers, &csv_path).context("Failed to save CSV")?;
    let report_file = export::write_report(&papers, &report_path, timestamp.naive_local())
        .context("Failed to save report")?;

    let seed_count = papers
        .iter()
        .filter(|r| r.paper.directive_type() == "SEED")
        .count();

    println!("\n{}", "=".repeat(60));
    println!("CRAWLER SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Directives processed: {}", directives.len());
    println!("Total papers collected: {}", papers.len());
    println!("  - SEED search results: {}", seed_count);
    println!("  - QUERY search results: {}", papers.len() - seed_count);
    if let Some(path) = csv_file {
        println!("CSV output: {}", path.display());
    }
    if let Some(path) = report_file {
        println!("Report output: {}", path.display());
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

/// Google Scholar fallback, unless disabled or unavailable.
fn build_scraper(cli: &Cli, config: &CrawlerConfig) -> Option<ScholarScraper> {
    if config.fallback == FallbackPolicy::Disabled {
        return None;
    }

    let jar = match &config.cookie_path {
        Some(path) => Some(CookieJar::new(path.clone())),
        None => CookieJar::at_default_path(),
    };

    match ScholarScraper::new(config.pacing, jar.as_ref(), cli.proxy.as_deref()) {
        Ok(scraper) => Some(scraper),
        Err(e) => {
            warn!(error = %e, "Google Scholar fallback unavailable");
            None
        }
    }
}

fn print_test_mode(directives: &[Directive], max_results: usize) {
    println!("\n{}", "=".repeat(60));
    println!("TEST MODE: Directives to be processed:");
    println!("{}", "=".repeat(60));
    for d in directives {
        println!("  {}. {}", d.ordinal, d);
    }
    println!("\nTotal: {} directives", directives.len());
    println!("Papers per directive: {}", max_results);
    println!("Expected total papers: {}", directives.len() * max_results);
}
