//! Snowball expansion: collect papers citing a resolved seed.

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::directive::{Directive, FilterSpec, SortHint};
use crate::paper::{Paper, ScoredPaper};
use crate::provider::CitationGraph;
use crate::scorer::RelevanceScorer;

/// Citing papers fetched per result slot, to absorb filter losses
const OVERFETCH_FACTOR: usize = 2;

/// Expands a seed anchor into its citing papers.
pub struct SnowballExpander<'a> {
    graph: &'a dyn CitationGraph,
    scorer: &'a RelevanceScorer,
    max_results: usize,
}

impl<'a> SnowballExpander<'a> {
    pub fn new(graph: &'a dyn CitationGraph, scorer: &'a RelevanceScorer, max_results: usize) -> Self {
        Self {
            graph,
            scorer,
            max_results,
        }
    }

    /// Anchor first, then at most `max_results - 1` citing papers.
    ///
    /// Provider failures end the expansion early; the anchor is always kept.
    pub async fn expand(&self, anchor: Paper, directive: &Directive) -> Vec<ScoredPaper> {
        let seed = directive.seed_reference().unwrap_or_default();
        let filter_text = directive.filter_text().unwrap_or_default();
        let sort_method = directive.sort_method();
        let filter = FilterSpec::parse(filter_text);

        let anchor = anchor.with_provenance(seed, filter_text, sort_method);
        let budget = self.max_results.saturating_sub(1);
        let citing = if budget == 0 || anchor.paper_id.is_empty() {
            Vec::new()
        } else {
            self.citing_papers(&anchor.paper_id, &filter, directive, budget)
                .await
        };

        let mut results = Vec::with_capacity(citing.len() + 1);
        results.push(ScoredPaper::unscored(anchor));
        results.extend(citing);
        results
    }

    async fn citing_papers(
        &self,
        paper_id: &str,
        filter: &FilterSpec,
        directive: &Directive,
        budget: usize,
    ) -> Vec<ScoredPaper> {
        let limit = self.max_results * OVERFETCH_FACTOR;
        let fetched = match self.graph.citations_of(paper_id, limit).await {
            Ok(papers) => papers,
            Err(e) => {
                warn!(paper_id, error = %e, "Failed to fetch citing papers");
                return Vec::new();
            }
        };

        let seed = directive.seed_reference().unwrap_or_default();
        let filter_text = directive.filter_text().unwrap_or_default();
        let fetched_count = fetched.len();
        let kept: Vec<Paper> = fetched
            .into_iter()
            .map(|p| p.with_provenance(seed, filter_text, directive.sort_method()))
            .filter(|p| filter.matches(p))
            .collect();
        debug!(fetched = fetched_count, kept = kept.len(), "Applied seed filter");

        let mut scored = if filter.has_keywords() {
            let mut scored = self.scorer.score_all(kept, &filter.keywords);
            sort_citing(&mut scored, directive.sort_hint);
            scored
        } else {
            kept.into_iter().map(ScoredPaper::unscored).collect()
        };

        scored.truncate(budget);
        info!(paper_id, count = scored.len(), "Snowball expansion complete");
        scored
    }
}

fn sort_citing(papers: &mut [ScoredPaper], hint: Option<SortHint>) {
    let by_score = |a: &ScoredPaper, b: &ScoredPaper| b.lexical_score.total_cmp(&a.lexical_score);
    if hint == Some(SortHint::Recency) {
        papers.sort_by(|a, b| b.paper.year.cmp(&a.paper.year).then_with(|| by_score(a, b)));
    } else {
        papers.sort_by(|a, b| -> Ordering {
            by_score(a, b).then_with(|| b.paper.citation_count.cmp(&a.paper.citation_count))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{paper, FakeGraph};
    use crate::scorer::ScoringMode;

    fn anchor() -> Paper {
        Paper {
            paper_id: "seed".to_string(),
            title: "Seed paper".to_string(),
            ..Default::default()
        }
        .into_seed_anchor()
    }

    fn graph(citations: Vec<Paper>) -> FakeGraph {
        FakeGraph {
            citations,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_budget_of_one_keeps_only_anchor() {
        let graph = graph(vec![paper("a", 2022, 5)]);
        let scorer = RelevanceScorer::default();
        let directive = Directive::seed("Seed 2020", "Year > 2020", None, 1);

        let results = SnowballExpander::new(&graph, &scorer, 1)
            .expand(anchor(), &directive)
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].paper.is_seed_anchor);
    }

    #[tokio::test]
    async fn test_overfetch_filter_and_truncate() -> crate::error::Result<()> {
        let citations = vec![
            paper("old", 2015, 500),
            paper("a", 2021, 1),
            paper("b", 2022, 2),
            paper("unknown year", 0, 3),
            paper("c", 2023, 4),
        ];
        let graph = graph(citations);
        let scorer = RelevanceScorer::default();
        let directive = Directive::seed("Seed 2020", "Year >= 2020", None, 1);

        let results = SnowballExpander::new(&graph, &scorer, 4)
            .expand(anchor(), &directive)
            .await;

        let titles: Vec<&str> = results.iter().map(|r| r.paper.title.as_str()).collect();
        assert_eq!(titles, vec!["Seed paper", "a", "b", "unknown year"]);
        assert!(results.iter().all(|r| r.paper.originating_seed == "Seed 2020"));
        assert_eq!(results[0].paper.filter_applied, "Year >= 2020");

        let limits = graph
            .citation_limits
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        assert_eq!(limits, vec![8]);
        Ok(())
    }

    #[tokio::test]
    async fn test_keywords_drive_ordering() {
        let mut relevant = paper("graph networks for graph data", 2021, 1);
        relevant.abstract_text = "graph".to_string();
        let graph = graph(vec![
            paper("unrelated", 2023, 900),
            paper("graph methods", 2022, 5),
            relevant,
        ]);
        let scorer = RelevanceScorer::new(ScoringMode::KeywordOverlap);
        let directive = Directive::seed("Seed 2020", r#""graph""#, None, 1);

        let results = SnowballExpander::new(&graph, &scorer, 10)
            .expand(anchor(), &directive)
            .await;
        let titles: Vec<&str> = results.iter().map(|r| r.paper.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Seed paper", "graph networks for graph data", "graph methods", "unrelated"]
        );
        assert_eq!(results[0].lexical_score, 0.0);
        assert_eq!(results[3].lexical_score, 0.0);
    }

    #[tokio::test]
    async fn test_recency_hint_sorts_by_year() {
        let graph = graph(vec![paper("graph a", 2021, 1), paper("graph b", 2024, 1)]);
        let scorer = RelevanceScorer::default();
        let directive = Directive::seed("Seed 2020", "graph", Some(SortHint::Recency), 1);

        let results = SnowballExpander::new(&graph, &scorer, 10)
            .expand(anchor(), &directive)
            .await;
        assert_eq!(results[1].paper.year, 2024);
        assert_eq!(results[2].paper.year, 2021);
        assert_eq!(results[1].paper.sort_method_applied, "recency");
    }

    #[tokio::test]
    async fn test_citation_failure_keeps_anchor() {
        let graph = FakeGraph {
            fail_citations: true,
            ..Default::default()
        };
        let scorer = RelevanceScorer::default();
        let directive = Directive::seed("Seed 2020", "", None, 1);

        let results = SnowballExpander::new(&graph, &scorer, 5)
            .expand(anchor(), &directive)
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].paper.is_seed_anchor);
    }
}
