//! Semantic Scholar API Client
//!
//! Primary bibliographic provider: keyword search, seed candidate lookup,
//! paper details and the citations graph.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - Detail endpoint: GET /graph/v1/paper/{paper_id}
//! - Citations endpoint: GET /graph/v1/paper/{paper_id}/citations
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::config::{pause, DelayRange};
use crate::error::{CrawlerError, OptionExt, Result};
use crate::paper::{normalize_abstract, Paper, SourceProvider};
use crate::provider::{CitationGraph, PaperSearch, SearchRequest, SeedCandidate};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for full paper records
const PAPER_FIELDS: &str =
    "paperId,title,authors,year,abstract,citationCount,url,venue,publicationDate,externalIds,journal";

/// Fields requested for seed candidates
const CANDIDATE_FIELDS: &str = "paperId,title,authors,year,citationCount";

/// Request timeout
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Browser user agents, one picked per request
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Debug, Deserialize)]
struct SSListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SSCitation {
    #[serde(rename = "citingPaper")]
    citing_paper: Option<SSPaper>,
}

#[derive(Debug, Default, Deserialize)]
struct SSPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Option<Vec<SSAuthor>>,
    year: Option<i32>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
    url: Option<String>,
    venue: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
    journal: Option<SSJournal>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSJournal {
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
}

impl SSPaper {
    fn author_names(&self) -> Vec<String> {
        self.authors
            .iter()
            .flatten()
            .map(|a| a.name.clone().unwrap_or_default())
            .collect()
    }

    fn into_paper(self) -> Paper {
        let authors = self.author_names();
        let (volume, issue, pages) = match self.journal {
            Some(j) => (
                j.volume.unwrap_or_default(),
                j.issue.unwrap_or_default(),
                j.pages.unwrap_or_default(),
            ),
            None => Default::default(),
        };

        Paper {
            paper_id: self.paper_id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            authors,
            year: self.year.unwrap_or(0),
            doi: self
                .external_ids
                .and_then(|ids| ids.doi)
                .unwrap_or_default(),
            abstract_text: self
                .abstract_text
                .map(|a| normalize_abstract(&a))
                .unwrap_or_default(),
            venue: self.venue.unwrap_or_default(),
            volume: volume.trim().to_string(),
            issue,
            pages: pages.trim().to_string(),
            url: self.url.unwrap_or_default(),
            citation_count: self.citation_count.unwrap_or(0),
            source_provider: SourceProvider::PrimaryApi,
            ..Default::default()
        }
    }

    fn into_candidate(self) -> Result<SeedCandidate> {
        let authors = self.author_names();
        let paper_id = self.paper_id.ok_or_parse("seed candidate without paperId")?;
        Ok(SeedCandidate {
            paper_id,
            title: self.title.unwrap_or_default(),
            authors,
            year: self.year.unwrap_or(0),
            citation_count: self.citation_count.unwrap_or(0),
        })
    }
}

/// Parse a `/paper/search` response into normalized papers.
pub fn parse_search_response(json: &str) -> Result<Vec<Paper>> {
    let response: SSListResponse<SSPaper> = parse_json(json)?;
    Ok(response.data.into_iter().map(SSPaper::into_paper).collect())
}

/// Parse a `/paper/{id}/citations` response into the citing papers.
pub fn parse_citations_response(json: &str) -> Result<Vec<Paper>> {
    let response: SSListResponse<SSCitation> = parse_json(json)?;
    Ok(response
        .data
        .into_iter()
        .filter_map(|c| c.citing_paper)
        .map(SSPaper::into_paper)
        .collect())
}

/// Parse a candidate search response, skipping hits without an identifier.
pub fn parse_candidates_response(json: &str) -> Result<Vec<SeedCandidate>> {
    let response: SSListResponse<SSPaper> = parse_json(json)?;
    Ok(response
        .data
        .into_iter()
        .filter_map(|p| match p.into_candidate() {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!(error = %e, "Skipping seed candidate");
                None
            }
        })
        .collect())
}

/// Parse a `/paper/{id}` response.
pub fn parse_detail_response(json: &str) -> Result<Paper> {
    let paper: SSPaper = parse_json(json)?;
    Ok(paper.into_paper())
}

fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| {
        CrawlerError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
    })
}

/// Semantic Scholar client with request pacing.
pub struct SemanticScholarClient {
    client: Client,
    api_key: Option<String>,
    pacing: DelayRange,
}

impl SemanticScholarClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Optional API key for higher rate limits
    /// * `pacing` - Delay applied before every request
    pub fn new(api_key: Option<String>, pacing: DelayRange) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CrawlerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if api_key.is_some() {
            info!("Semantic Scholar API key configured");
        }

        Ok(Self {
            client,
            api_key,
            pacing,
        })
    }

    /// Paced GET returning the response body.
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        pause(&self.pacing).await;

        let url = format!("{}{}", SS_API_BASE, path);
        debug!(url = %url, params = ?params, "Semantic Scholar request");

        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let mut request = self
            .client
            .get(&url)
            .query(params)
            .header(reqwest::header::USER_AGENT, user_agent);

        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlerError::rate_limited(response.headers()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CrawlerError::Api {
                code: status.as_u16() as i32,
                message: format!("Semantic Scholar API error: {} - {}", status, error_text),
            });
        }

        Ok(response.text().await?)
    }

    async fn get_json<T>(&self, path: &str, params: &[(&str, String)], parse: fn(&str) -> Result<T>) -> Result<T> {
        let body = self.get(path, params).await?;
        parse(&body)
    }
}

/// Search query sent to the API, title-qualified in exact-title mode.
fn search_query(request: &SearchRequest) -> String {
    if request.exact_title {
        format!("title:\"{}\"", request.query)
    } else {
        request.query.clone()
    }
}

#[async_trait]
impl PaperSearch for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
        let mut params = vec![
            ("query", search_query(request)),
            ("limit", request.limit.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(sort) = &request.sort {
            params.push(("sort", sort.clone()));
        }

        let papers = self
            .get_json("/paper/search", &params, parse_search_response)
            .await?;
        info!(
            query = %request.query,
            count = papers.len(),
            "Semantic Scholar search complete"
        );
        Ok(papers.into_iter().take(request.limit).collect())
    }
}

#[async_trait]
impl CitationGraph for SemanticScholarClient {
    async fn candidates(&self, text: &str, limit: usize) -> Result<Vec<SeedCandidate>> {
        let params = [
            ("query", text.to_string()),
            ("limit", limit.to_string()),
            ("fields", CANDIDATE_FIELDS.to_string()),
        ];
        self.get_json("/paper/search", &params, parse_candidates_response)
            .await
    }

    async fn detail_of(&self, paper_id: &str) -> Result<Paper> {
        let params = [("fields", PAPER_FIELDS.to_string())];
        let mut paper = self
            .get_json(&format!("/paper/{}", paper_id), &params, parse_detail_response)
            .await?;
        if paper.paper_id.is_empty() {
            paper.paper_id = paper_id.to_string();
        }
        Ok(paper)
    }

    async fn citations_of(&self, paper_id: &str, limit: usize) -> Result<Vec<Paper>> {
        let params = [
            ("limit", limit.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        let papers = self
            .get_json(
                &format!("/paper/{}/citations", paper_id),
                &params,
                parse_citations_response,
            )
            .await?;
        info!(paper_id, count = papers.len(), "Citations API returned raw citations");
        Ok(papers)
    }
}
