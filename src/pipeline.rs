//! Directive execution.
//!
//! Directives run strictly one after another. Each one goes through its own
//! resolve/expand or search step and the filter & rank policy before the
//! next starts; results are appended to one aggregate list.

use chrono::{Datelike, Local};
use tracing::{info, warn};

use crate::config::CrawlerConfig;
use crate::directive::{Directive, DirectiveBody};
use crate::paper::{RankedPaper, ScoredPaper};
use crate::provider::{CitationGraph, PaperSearch};
use crate::ranking;
use crate::resolver;
use crate::scorer::RelevanceScorer;
use crate::search::QueryOrchestrator;
use crate::snowball::SnowballExpander;

/// Runs parsed directives against the configured providers.
pub struct Crawler<'a> {
    config: &'a CrawlerConfig,
    graph: &'a dyn CitationGraph,
    primary: &'a dyn PaperSearch,
    secondary: Option<&'a dyn PaperSearch>,
    scorer: RelevanceScorer,
    current_year: i32,
}

impl<'a> Crawler<'a> {
    pub fn new(
        config: &'a CrawlerConfig,
        graph: &'a dyn CitationGraph,
        primary: &'a dyn PaperSearch,
        secondary: Option<&'a dyn PaperSearch>,
    ) -> Self {
        Self {
            config,
            graph,
            primary,
            secondary,
            scorer: RelevanceScorer::default(),
            current_year: Local::now().year(),
        }
    }

    pub fn with_scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Fix the year used by the recency retention rule.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Provider sort for a directive: its SORT hint, else the run-wide override.
    pub fn effective_sort(&self, directive: &Directive) -> Option<String> {
        directive
            .sort_hint
            .and_then(|hint| hint.provider_sort())
            .or_else(|| self.config.provider_sort_override())
            .map(str::to_string)
    }

    /// Raw, unranked results of one directive. Never fails; provider errors
    /// shrink the result instead.
    pub async fn execute_directive(&self, directive: &Directive) -> Vec<ScoredPaper> {
        let max_results = self.config.max_results;
        match &directive.body {
            DirectiveBody::Seed { reference, .. } => {
                let Some(resolution) = resolver::resolve(self.graph, reference).await else {
                    warn!(seed = %reference, "Could not resolve seed paper, skipping directive");
                    return Vec::new();
                };
                SnowballExpander::new(self.graph, &self.scorer, max_results)
                    .expand(resolution.anchor, directive)
                    .await
            }
            DirectiveBody::Query => {
                let sort = self.effective_sort(directive);
                let orchestrator = QueryOrchestrator::new(
                    self.primary,
                    self.secondary,
                    self.config.fallback,
                    self.config.exact_title,
                );
                orchestrator
                    .search(&directive.raw_text, max_results, sort.as_deref())
                    .await
                    .into_iter()
                    .map(|p| ScoredPaper::unscored(p.with_provenance("", "", directive.sort_method())))
                    .collect()
            }
        }
    }

    /// Execute every directive in order, rank each one's results and keep
    /// the best `max_results` of them.
    pub async fn run(&self, directives: &[Directive]) -> Vec<RankedPaper> {
        let mut all = Vec::new();
        for (idx, directive) in directives.iter().enumerate() {
            let position = idx + 1;
            info!(
                position,
                total = directives.len(),
                directive = %directive,
                "Processing directive"
            );

            let raw = self.execute_directive(directive).await;
            let group = directive.group_label(position);
            let mut ranked = ranking::apply(raw, &group, self.current_year);
            ranked.truncate(self.config.max_results);
            info!(group = %group, count = ranked.len(), "Directive complete");
            all.extend(ranked);
        }
        all
    }
}
