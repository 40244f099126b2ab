//! QUERY orchestration across the primary API and the scraping fallback.
//!
//! The primary provider is always tried first. The scraper is only consulted
//! when the primary returns fewer than half the requested results, and its
//! failures never cost the directive what the primary already produced.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::FallbackPolicy;
use crate::paper::Paper;
use crate::provider::{PaperSearch, SearchRequest};

/// Upper bound on primary candidates per query
pub const PRIMARY_LIMIT_CAP: usize = 50;

/// Primary candidates requested for a result budget: `min(2 * max, 50)`
pub fn primary_limit(max_results: usize) -> usize {
    (max_results * 2).min(PRIMARY_LIMIT_CAP)
}

/// Whether a primary result count calls for the fallback.
pub fn needs_fallback(primary_count: usize, max_results: usize) -> bool {
    primary_count < max_results / 2
}

/// Strategy selection for QUERY directives.
pub struct QueryOrchestrator<'a> {
    primary: &'a dyn PaperSearch,
    secondary: Option<&'a dyn PaperSearch>,
    policy: FallbackPolicy,
    exact_title: bool,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(
        primary: &'a dyn PaperSearch,
        secondary: Option<&'a dyn PaperSearch>,
        policy: FallbackPolicy,
        exact_title: bool,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
            exact_title,
        }
    }

    fn available_secondary(&self) -> Option<&'a dyn PaperSearch> {
        self.secondary.filter(|s| s.is_available())
    }

    /// Search for `query` with a budget of `max_results`.
    ///
    /// Every primary candidate is returned so the ranking policy sees the
    /// whole over-fetched set; callers cap the ranked output.
    pub async fn search(&self, query: &str, max_results: usize, sort: Option<&str>) -> Vec<Paper> {
        if self.policy == FallbackPolicy::SecondaryOnly {
            return match self.available_secondary() {
                Some(secondary) => {
                    secondary_search(secondary, &SearchRequest::new(query, max_results)).await
                }
                None => {
                    warn!(query, "Scraping provider unavailable, no results");
                    Vec::new()
                }
            };
        }

        let request = SearchRequest {
            sort: sort.map(str::to_string),
            exact_title: self.exact_title,
            ..SearchRequest::new(query, primary_limit(max_results))
        };
        let mut papers = match self.primary.search(&request).await {
            Ok(papers) => papers,
            Err(e) => {
                warn!(query, provider = self.primary.name(), error = %e, "Primary search failed");
                Vec::new()
            }
        };

        if self.policy == FallbackPolicy::Disabled || !needs_fallback(papers.len(), max_results) {
            return papers;
        }
        let Some(secondary) = self.available_secondary() else {
            return papers;
        };

        info!(
            query,
            primary = papers.len(),
            provider = secondary.name(),
            "Primary under-delivered, falling back"
        );
        let remaining = max_results.saturating_sub(papers.len());
        let extra = secondary_search(secondary, &SearchRequest::new(query, remaining)).await;
        merge_by_title(&mut papers, extra);
        papers
    }
}

async fn secondary_search(secondary: &dyn PaperSearch, request: &SearchRequest) -> Vec<Paper> {
    match secondary.search(request).await {
        Ok(papers) => papers,
        Err(e) => {
            warn!(query = %request.query, provider = secondary.name(), error = %e, "Fallback search failed");
            Vec::new()
        }
    }
}

/// Append papers whose lower-cased title is not present yet.
pub fn merge_by_title(papers: &mut Vec<Paper>, extra: Vec<Paper>) {
    let mut seen: HashSet<String> = papers.iter().map(Paper::title_key).collect();
    for paper in extra {
        if seen.insert(paper.title_key()) {
            papers.push(paper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceProvider;
    use crate::provider::fake::{paper, FakeSearch};

    fn scraped(title: &str) -> Paper {
        Paper {
            source_provider: SourceProvider::FallbackScraper,
            ..paper(title, 2020, 50)
        }
    }

    #[test]
    fn test_limits() {
        assert_eq!(primary_limit(5), 10);
        assert_eq!(primary_limit(40), 50);
        assert!(needs_fallback(4, 10));
        assert!(!needs_fallback(5, 10));
        assert!(!needs_fallback(0, 1));
    }

    #[tokio::test]
    async fn test_primary_request_shape() {
        let primary = FakeSearch::new("primary", vec![paper("a", 2020, 1)]);
        let orchestrator = QueryOrchestrator::new(&primary, None, FallbackPolicy::Auto, true);

        orchestrator.search("graphs", 30, Some("year:desc")).await;
        let requests = primary.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, 50);
        assert_eq!(requests[0].sort.as_deref(), Some("year:desc"));
        assert!(requests[0].exact_title);
    }

    #[tokio::test]
    async fn test_overfetched_primary_results_are_kept() {
        let results = (0..10).map(|i| paper(&format!("p{}", i), 2020, 1)).collect();
        let primary = FakeSearch::new("primary", results);
        let orchestrator = QueryOrchestrator::new(&primary, None, FallbackPolicy::Disabled, false);

        let papers = orchestrator.search("q", 5, None).await;
        assert_eq!(primary.requests()[0].limit, 10);
        assert_eq!(papers.len(), 10);
    }

    #[tokio::test]
    async fn test_fallback_merges_unique_titles() {
        let primary = FakeSearch::new("primary", vec![paper("Graph Networks", 2020, 1)]);
        let secondary = FakeSearch::new(
            "secondary",
            vec![scraped("graph networks"), scraped("Message Passing"), scraped("Extra")],
        );
        let orchestrator =
            QueryOrchestrator::new(&primary, Some(&secondary), FallbackPolicy::Auto, false);

        let papers = orchestrator.search("graphs", 4, None).await;
        let titles: Vec<&str> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Graph Networks", "Message Passing", "Extra"]);
        assert_eq!(secondary.requests()[0].limit, 3);
    }

    #[tokio::test]
    async fn test_no_fallback_when_primary_delivers() {
        let primary = FakeSearch::new("primary", vec![paper("a", 2020, 1), paper("b", 2020, 1)]);
        let secondary = FakeSearch::new("secondary", vec![scraped("c")]);
        let orchestrator =
            QueryOrchestrator::new(&primary, Some(&secondary), FallbackPolicy::Auto, false);

        assert_eq!(orchestrator.search("q", 4, None).await.len(), 2);
        assert!(secondary.requests().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_and_unavailable_secondary() {
        let primary = FakeSearch::new("primary", Vec::new());
        let secondary = FakeSearch::new("secondary", vec![scraped("c")]);

        let disabled =
            QueryOrchestrator::new(&primary, Some(&secondary), FallbackPolicy::Disabled, false);
        assert!(disabled.search("q", 10, None).await.is_empty());

        let offline = FakeSearch {
            available: false,
            ..FakeSearch::new("secondary", vec![scraped("c")])
        };
        let auto = QueryOrchestrator::new(&primary, Some(&offline), FallbackPolicy::Auto, false);
        assert!(auto.search("q", 10, None).await.is_empty());
        assert!(secondary.requests().is_empty());
        assert!(offline.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failures_degrade_to_partial_results() {
        let primary = FakeSearch::failing("primary");
        let secondary = FakeSearch::new("secondary", vec![scraped("c")]);
        let orchestrator =
            QueryOrchestrator::new(&primary, Some(&secondary), FallbackPolicy::Auto, false);
        assert_eq!(orchestrator.search("q", 10, None).await.len(), 1);

        let primary = FakeSearch::new("primary", vec![paper("a", 2020, 1)]);
        let broken = FakeSearch::failing("secondary");
        let orchestrator =
            QueryOrchestrator::new(&primary, Some(&broken), FallbackPolicy::Auto, false);
        assert_eq!(orchestrator.search("q", 10, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_secondary_only() {
        let primary = FakeSearch::new("primary", vec![paper("a", 2020, 1)]);
        let secondary = FakeSearch::new("secondary", vec![scraped("c"), scraped("d")]);
        let orchestrator =
            QueryOrchestrator::new(&primary, Some(&secondary), FallbackPolicy::SecondaryOnly, false);

        let papers = orchestrator.search("q", 1, None).await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "c");
        assert!(primary.requests().is_empty());
    }
}
