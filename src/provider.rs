//! Provider capability interfaces.
//!
//! The pipeline never talks to a concrete API. Keyword search goes through
//! [`PaperSearch`], which both the Semantic Scholar client and the Google
//! Scholar scraper implement, so the orchestrator can pick either as a
//! strategy. Seed resolution and snowballing need the citation graph
//! operations of [`CitationGraph`], which only the primary API offers.

use async_trait::async_trait;

use crate::error::Result;
use crate::paper::Paper;

/// A keyword search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    /// Provider sort parameter, e.g. `year:desc`; `None` is provider default
    pub sort: Option<String>,
    /// Match the query against titles only
    pub exact_title: bool,
}

impl SearchRequest {
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.to_string(),
            limit,
            ..Default::default()
        }
    }
}

/// Keyword search over some bibliographic source.
#[async_trait]
pub trait PaperSearch: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Whether the provider can be used at all in this run
    fn is_available(&self) -> bool {
        true
    }

    /// Run a search, returning at most `request.limit` papers.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>>;
}

/// Lightweight search hit used to pick a seed paper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedCandidate {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// 0 when unknown
    pub year: i32,
    pub citation_count: u64,
}

impl SeedCandidate {
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Fallback record when the full detail lookup fails.
    pub fn to_paper(&self) -> Paper {
        Paper {
            paper_id: self.paper_id.clone(),
            title: self.title.clone(),
            authors: self.authors.clone(),
            year: self.year,
            citation_count: self.citation_count,
            ..Default::default()
        }
    }
}

/// Citation graph operations of the primary provider.
#[async_trait]
pub trait CitationGraph: Send + Sync {
    /// Broad text search returning up to `limit` lightweight candidates.
    async fn candidates(&self, text: &str, limit: usize) -> Result<Vec<SeedCandidate>>;

    /// Full record for one paper.
    async fn detail_of(&self, paper_id: &str) -> Result<Paper>;

    /// Papers citing `paper_id`, at most `limit`.
    async fn citations_of(&self, paper_id: &str, limit: usize) -> Result<Vec<Paper>>;
}

/// In-memory providers for unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::CrawlerError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub fn paper(title: &str, year: i32, citations: u64) -> Paper {
        Paper {
            paper_id: format!("id-{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            year,
            citation_count: citations,
            ..Default::default()
        }
    }

    pub fn api_error() -> CrawlerError {
        CrawlerError::Api {
            code: 500,
            message: "boom".to_string(),
        }
    }

    /// Search provider with canned results.
    pub struct FakeSearch {
        pub name: &'static str,
        pub results: Vec<Paper>,
        pub fail: bool,
        pub available: bool,
        pub requests: Mutex<Vec<SearchRequest>>,
    }

    impl FakeSearch {
        pub fn new(name: &'static str, results: Vec<Paper>) -> Self {
            Self {
                name,
                results,
                fail: false,
                available: true,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, Vec::new())
            }
        }

        pub fn requests(&self) -> Vec<SearchRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl PaperSearch for FakeSearch {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            if self.fail {
                return Err(api_error());
            }
            Ok(self.results.iter().take(request.limit).cloned().collect())
        }
    }

    /// Citation graph with canned candidates, details and citations.
    #[derive(Default)]
    pub struct FakeGraph {
        pub candidates: Vec<SeedCandidate>,
        pub details: HashMap<String, Paper>,
        pub citations: Vec<Paper>,
        pub fail_candidates: bool,
        pub fail_citations: bool,
        pub citation_limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl CitationGraph for FakeGraph {
        async fn candidates(&self, _text: &str, limit: usize) -> Result<Vec<SeedCandidate>> {
            if self.fail_candidates {
                return Err(api_error());
            }
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }

        async fn detail_of(&self, paper_id: &str) -> Result<Paper> {
            self.details.get(paper_id).cloned().ok_or_else(api_error)
        }

        async fn citations_of(&self, _paper_id: &str, limit: usize) -> Result<Vec<Paper>> {
            if let Ok(mut limits) = self.citation_limits.lock() {
                limits.push(limit);
            }
            if self.fail_citations {
                return Err(api_error());
            }
            Ok(self.citations.iter().take(limit).cloned().collect())
        }
    }
}
