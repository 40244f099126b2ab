//! Google Scholar scraping fallback.
//!
//! Results are pulled lazily one item at a time from paginated result pages.
//! The scraper waits before its first request and between items, since
//! Scholar throttles automated clients aggressively.

use crate::config::{pause, PacingConfig};
use crate::cookies::CookieJar;
use crate::error::{CrawlerError, Result};
use crate::paper::{normalize_abstract, Paper, SourceProvider};
use crate::provider::{PaperSearch, SearchRequest};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Results per Scholar page
const PAGE_SIZE: usize = 10;

/// Hard stop on pagination
const MAX_PAGES: usize = 10;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// A single search result from Google Scholar
#[derive(Debug, Clone, Default)]
pub struct ScholarResult {
    pub title: String,
    /// Author line, comma separated
    pub author: String,
    pub year: String,
    pub venue: String,
    pub article_url: String,
    pub citations: String,
    pub snippet: String,
}

impl ScholarResult {
    /// Normalize into a pipeline record.
    pub fn into_paper(self) -> Paper {
        let authors = self
            .author
            .split(',')
            .map(|a| a.trim().trim_end_matches('…').trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        Paper {
            title: self.title,
            authors,
            year: self.year.trim().parse().unwrap_or(0),
            abstract_text: normalize_abstract(&self.snippet),
            venue: self.venue,
            url: self.article_url,
            citation_count: self.citations.trim().parse().unwrap_or(0),
            source_provider: SourceProvider::FallbackScraper,
            ..Default::default()
        }
    }
}

/// Google Scholar scraper
pub struct ScholarScraper {
    client: reqwest::Client,
    cookie_header: String,
    pacing: PacingConfig,
}

impl ScholarScraper {
    /// Build a scraper. Cookies are read once from `cookies` when given.
    pub fn new(
        pacing: PacingConfig,
        cookies: Option<&CookieJar>,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let cookie_header = cookies.map(|jar| jar.google_header()).unwrap_or_default();
        if cookie_header.is_empty() {
            warn!("No Scholar cookies loaded; the fallback scraper may hit CAPTCHAs");
        }

        Ok(Self {
            client: build_http_client(proxy)?,
            cookie_header,
            pacing,
        })
    }
}

/// Source of numbered Scholar result pages.
#[async_trait]
trait ResultPages: Send + Sync {
    async fn fetch_page(&self, query: &str, page: usize) -> Result<Vec<ScholarResult>>;
}

#[async_trait]
impl ResultPages for ScholarScraper {
    async fn fetch_page(&self, query: &str, page: usize) -> Result<Vec<ScholarResult>> {
        let url = build_search_url(DEFAULT_SCHOLAR_URL, query, page * PAGE_SIZE)?;
        debug!(page = page + 1, url = %url, "Fetching Scholar page");

        let html = fetch_page_with_cookies(&self.client, &url, &self.cookie_header).await?;
        if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
            warn!(page = page + 1, "CAPTCHA detected");
            return Err(CrawlerError::Captcha);
        }

        parse_result_items(&html)
    }
}

/// Lazy sequence over Scholar results, fetching pages on demand.
struct ScholarCursor<'a> {
    pages: &'a dyn ResultPages,
    query: String,
    buffer: VecDeque<ScholarResult>,
    next_page: usize,
    exhausted: bool,
}

impl<'a> ScholarCursor<'a> {
    fn new(pages: &'a dyn ResultPages, query: &str) -> Self {
        Self {
            pages,
            query: query.to_string(),
            buffer: VecDeque::new(),
            next_page: 0,
            exhausted: false,
        }
    }

    /// Next result, or `None` once Scholar has no more.
    async fn next_result(&mut self) -> Result<Option<ScholarResult>> {
        if self.buffer.is_empty() && !self.exhausted {
            if self.next_page >= MAX_PAGES {
                self.exhausted = true;
            } else {
                let page = self.pages.fetch_page(&self.query, self.next_page).await?;
                self.next_page += 1;
                if page.len() < PAGE_SIZE {
                    self.exhausted = true;
                }
                self.buffer.extend(page);
            }
        }
        Ok(self.buffer.pop_front())
    }
}

#[async_trait]
impl PaperSearch for ScholarScraper {
    fn name(&self) -> &'static str {
        "google_scholar"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let papers = collect_paced(self, &request.query, request.limit, &self.pacing).await?;
        info!(query = %request.query, count = papers.len(), "Google Scholar search complete");
        Ok(papers)
    }
}

/// Pull up to `limit` results: one warmup pause, then a pause between items
/// but none after the last one. An error before the first item is returned;
/// a later one ends the pull with what was collected.
async fn collect_paced(
    pages: &dyn ResultPages,
    query: &str,
    limit: usize,
    pacing: &PacingConfig,
) -> Result<Vec<Paper>> {
    pause(&pacing.secondary_warmup).await;

    let mut cursor = ScholarCursor::new(pages, query);
    let mut papers = Vec::new();

    while papers.len() < limit {
        match cursor.next_result().await {
            Ok(Some(result)) => {
                papers.push(result.into_paper());
                if papers.len() < limit {
                    pause(&pacing.secondary_item).await;
                }
            }
            Ok(None) => break,
            Err(e) if papers.is_empty() => return Err(e),
            Err(e) => {
                warn!(fetched = papers.len(), error = %e, "Error fetching Scholar result, keeping partial results");
                break;
            }
        }
    }

    Ok(papers)
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            CrawlerError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CrawlerError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Build Google Scholar search URL
fn build_search_url(base_url: &str, query: &str, start: usize) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| CrawlerError::Config(format!("Invalid base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("hl", "en")
        .append_pair("start", &start.to_string());

    Ok(url)
}

async fn fetch_page_with_cookies(
    client: &reqwest::Client,
    url: &Url,
    cookie_header: &str,
) -> Result<String> {
    let mut request = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9");

    if !cookie_header.is_empty() {
        request = request.header("Cookie", cookie_header);
    }

    let response = request.send().await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CrawlerError::rate_limited(response.headers()));
    }

    if !status.is_success() {
        return Err(CrawlerError::Api {
            code: status.as_u16() as i32,
            message: format!("HTTP error: {}", status),
        });
    }

    Ok(response.text().await?)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlerError::Parse(e.to_string()))
}

/// Parse a Google Scholar result page.
pub fn parse_result_items(html: &str) -> Result<Vec<ScholarResult>> {
    let document = Html::parse_document(html);

    let item_selector = selector("div.gs_r.gs_or.gs_scl")?;
    let title_selector = selector("h3.gs_rt")?;
    let link_selector = selector("h3.gs_rt a")?;
    let meta_selector = selector("div.gs_a")?;
    let snippet_selector = selector("div.gs_rs")?;
    let cite_selector = selector("div.gs_fl a")?;

    let year_regex =
        Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| CrawlerError::Parse(e.to_string()))?;
    let cite_regex =
        Regex::new(r"Cited by\s*(\d+)").map_err(|e| CrawlerError::Parse(e.to_string()))?;

    let mut results = Vec::new();

    for item in document.select(&item_selector) {
        let mut data = ScholarResult::default();

        if let Some(link) = item.select(&link_selector).next() {
            data.title = link.text().collect::<String>().trim().to_string();
            data.article_url = link.value().attr("href").unwrap_or("").to_string();
        } else if let Some(title_elem) = item.select(&title_selector).next() {
            data.title = title_elem.text().collect::<String>().trim().to_string();
        }

        // "A Author, B Author - Venue, 2021 - publisher"
        if let Some(meta_elem) = item.select(&meta_selector).next() {
            let meta_text = meta_elem.text().collect::<String>().replace('\u{a0}', " ");
            let parts: Vec<&str> = meta_text.split(" - ").collect();

            if let Some(authors) = parts.first() {
                data.author = authors.trim().to_string();
            }

            if let Some(venue_year) = parts.get(1) {
                match year_regex.find(venue_year) {
                    Some(year) => {
                        data.year = year.as_str().to_string();
                        data.venue = venue_year[..year.start()]
                            .trim()
                            .trim_end_matches(',')
                            .to_string();
                    }
                    None => data.venue = venue_year.trim().to_string(),
                }
            }
        }

        if let Some(snippet_elem) = item.select(&snippet_selector).next() {
            data.snippet = snippet_elem.text().collect::<String>().trim().to_string();
        }

        for link in item.select(&cite_selector) {
            let href = link.value().attr("href").unwrap_or("");
            if !href.contains("cites=") {
                continue;
            }
            let text = link.text().collect::<String>();
            if let Some(count) = cite_regex.captures(&text).and_then(|caps| caps.get(1)) {
                data.citations = count.as_str().to_string();
                break;
            }
        }

        if !data.title.is_empty() {
            results.push(data);
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use tokio::time::Instant;

    /// Pages of numbered results; pages at or past `fail_from` error out.
    struct CannedPages {
        pages: Vec<usize>,
        fail_from: Option<usize>,
    }

    #[async_trait]
    impl ResultPages for CannedPages {
        async fn fetch_page(&self, _query: &str, page: usize) -> Result<Vec<ScholarResult>> {
            if self.fail_from.is_some_and(|f| page >= f) {
                return Err(CrawlerError::Captcha);
            }
            let count = self.pages.get(page).copied().unwrap_or(0);
            Ok((0..count)
                .map(|i| ScholarResult {
                    title: format!("p{}-{}", page, i),
                    ..Default::default()
                })
                .collect())
        }
    }

    fn fixed_pacing() -> PacingConfig {
        PacingConfig {
            primary: DelayRange::zero(),
            secondary_warmup: DelayRange::new(5.0, 5.0),
            secondary_item: DelayRange::new(2.0, 2.0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_and_item_pauses() -> Result<()> {
        let pages = CannedPages {
            pages: vec![3],
            fail_from: None,
        };

        let start = Instant::now();
        let papers = collect_paced(&pages, "q", 3, &fixed_pacing()).await?;
        let elapsed = start.elapsed();
        assert_eq!(papers.len(), 3);
        // 5 s warmup, then 2 s between items and none after the third
        assert!(elapsed >= Duration::from_secs(9), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10), "{:?}", elapsed);

        let start = Instant::now();
        let papers = collect_paced(&pages, "q", 2, &fixed_pacing()).await?;
        let elapsed = start.elapsed();
        assert_eq!(papers.len(), 2);
        assert!(elapsed >= Duration::from_secs(7), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(8), "{:?}", elapsed);
        Ok(())
    }

    #[tokio::test]
    async fn test_pages_pulled_lazily_with_partial_results() -> Result<()> {
        let pages = CannedPages {
            pages: vec![PAGE_SIZE, PAGE_SIZE],
            fail_from: Some(1),
        };
        let papers = collect_paced(&pages, "q", 5, &PacingConfig::none()).await?;
        assert_eq!(papers.len(), 5);

        let papers = collect_paced(&pages, "q", 15, &PacingConfig::none()).await?;
        assert_eq!(papers.len(), PAGE_SIZE);
        assert_eq!(papers[0].title, "p0-0");
        Ok(())
    }

    #[tokio::test]
    async fn test_first_page_error_is_returned() {
        let pages = CannedPages {
            pages: Vec::new(),
            fail_from: Some(0),
        };
        let result = collect_paced(&pages, "q", 5, &PacingConfig::none()).await;
        assert!(matches!(result, Err(CrawlerError::Captcha)));
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() -> Result<()> {
        let pages = CannedPages {
            pages: vec![4, PAGE_SIZE],
            fail_from: None,
        };
        let papers = collect_paced(&pages, "q", 20, &PacingConfig::none()).await?;
        assert_eq!(papers.len(), 4);
        Ok(())
    }

    const RESULT_PAGE: &str = r#"<html><body>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt"><a href="https://example.org/gnn">A Survey of Graph Neural Networks</a></h3>
          <div class="gs_a">J Zhou, G Cui, S Hu&nbsp;- AI Open, 2020 - Elsevier</div>
          <div class="gs_rs">Lots of learning tasks require dealing with
             graph data.</div>
          <div class="gs_fl gs_flb">
            <a href="/scholar?cites=123&hl=en">Cited by 4521</a>
            <a href="/scholar?q=related:x">Related articles</a>
          </div>
        </div>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt">[CITATION] Untitled Report</h3>
          <div class="gs_a">K Smith - Tech report</div>
        </div>
    </body></html>"#;

    #[test]
    fn test_build_search_url() -> Result<()> {
        let url = build_search_url(DEFAULT_SCHOLAR_URL, "graph neural networks", 10)?;
        assert!(url.as_str().contains("q=graph+neural+networks"));
        assert!(url.as_str().contains("start=10"));
        Ok(())
    }

    #[test]
    fn test_parse_empty_html() -> Result<()> {
        assert!(parse_result_items("<html><body></body></html>")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_result_page() -> Result<()> {
        let results = parse_result_items(RESULT_PAGE)?;
        assert_eq!(results.len(), 2);

        let gnn = &results[0];
        assert_eq!(gnn.title, "A Survey of Graph Neural Networks");
        assert_eq!(gnn.article_url, "https://example.org/gnn");
        assert_eq!(gnn.author, "J Zhou, G Cui, S Hu");
        assert_eq!(gnn.year, "2020");
        assert_eq!(gnn.venue, "AI Open");
        assert_eq!(gnn.citations, "4521");

        let report = &results[1];
        assert_eq!(report.title, "[CITATION] Untitled Report");
        assert_eq!(report.venue, "Tech report");
        assert_eq!(report.year, "");
        Ok(())
    }

    #[test]
    fn test_into_paper() -> Result<()> {
        let paper = parse_result_items(RESULT_PAGE)?.remove(0).into_paper();
        assert_eq!(paper.authors, vec!["J Zhou", "G Cui", "S Hu"]);
        assert_eq!(paper.year, 2020);
        assert_eq!(paper.citation_count, 4521);
        assert_eq!(paper.abstract_text, "Lots of learning tasks require dealing with graph data.");
        assert_eq!(paper.source_provider, SourceProvider::FallbackScraper);
        assert!(paper.doi.is_empty());
        Ok(())
    }
}
