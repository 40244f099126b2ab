//! Normalized paper records and the ranking stages built on top of them.
//!
//! Scoring happens in explicit stages, each producing a new value:
//! [`Paper`] → [`ScoredPaper`] (lexical score) → [`RankedPaper`] (final score
//! and result group). Nothing is mutated in place once scored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum abstract length kept on a record (characters)
pub const ABSTRACT_MAX_CHARS: usize = 500;

/// Where a record came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceProvider {
    /// Primary bibliographic API (search results and citing papers)
    #[default]
    PrimaryApi,
    /// Primary API, the resolved seed paper itself
    PrimaryApiSeed,
    /// Scraping fallback provider
    FallbackScraper,
}

impl SourceProvider {
    pub fn label(&self) -> &'static str {
        match self {
            SourceProvider::PrimaryApi => "Semantic Scholar",
            SourceProvider::PrimaryApiSeed => "Semantic Scholar (SEED_SOURCE)",
            SourceProvider::FallbackScraper => "Google Scholar",
        }
    }
}

impl fmt::Display for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized paper, as produced from a single provider response item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Provider identifier (Semantic Scholar paperId); empty for scraped items
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// Publication year, 0 when unknown
    pub year: i32,
    pub doi: String,
    /// Whitespace-collapsed, at most [`ABSTRACT_MAX_CHARS`] characters
    pub abstract_text: String,
    pub venue: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub url: String,
    pub citation_count: u64,
    pub source_provider: SourceProvider,
    /// Seed reference of the SEED directive that produced this record
    pub originating_seed: String,
    pub filter_applied: String,
    pub sort_method_applied: String,
    pub is_seed_anchor: bool,
}

impl Paper {
    /// Attach directive provenance, consuming the fresh provider record.
    pub fn with_provenance(self, seed: &str, filter: &str, sort_method: &str) -> Self {
        Self {
            originating_seed: seed.to_string(),
            filter_applied: filter.to_string(),
            sort_method_applied: sort_method.to_string(),
            ..self
        }
    }

    /// Mark this record as the anchor of a SEED directive.
    pub fn into_seed_anchor(self) -> Self {
        Self {
            is_seed_anchor: true,
            source_provider: SourceProvider::PrimaryApiSeed,
            ..self
        }
    }

    /// `SEED` when produced by a seed directive, `QUERY` otherwise
    pub fn directive_type(&self) -> &'static str {
        if self.originating_seed.is_empty() {
            "QUERY"
        } else {
            "SEED"
        }
    }

    /// Lower-cased title used for cross-provider de-duplication
    pub fn title_key(&self) -> String {
        self.title.to_lowercase()
    }

    /// Text the relevance scorer looks at
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }
}

/// Collapse whitespace and truncate to [`ABSTRACT_MAX_CHARS`] characters.
pub fn normalize_abstract(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ABSTRACT_MAX_CHARS)
        .collect()
}

/// A paper with its lexical relevance score (0.0 when unscored).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPaper {
    pub paper: Paper,
    pub lexical_score: f64,
}

impl ScoredPaper {
    pub fn unscored(paper: Paper) -> Self {
        Self {
            paper,
            lexical_score: 0.0,
        }
    }
}

/// A retained paper with its blended final score and result group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPaper {
    pub paper: Paper,
    pub lexical_score: f64,
    pub final_score: f64,
    pub query_group: String,
}
