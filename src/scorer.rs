//! Lexical relevance scoring of a paper against a keyword set.
//!
//! Each paper is scored on its own: BM25 runs over a one-document corpus
//! made of the paper's title and abstract, so the score is a saturated term
//! frequency weight rather than a corpus-relative ranking. Builds without the
//! `bm25` feature fall back to a keyword overlap heuristic.

use tracing::debug;

use crate::paper::{Paper, ScoredPaper};

/// BM25 term frequency saturation
pub const BM25_K1: f64 = 1.5;
/// BM25 length normalization
pub const BM25_B: f64 = 0.75;

/// Keyword overlap weights
const TITLE_HIT_WEIGHT: f64 = 3.0;
const ABSTRACT_HIT_CAP: usize = 3;

/// Scoring algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Okapi BM25 over a single-document corpus
    Bm25,
    /// Title hits weigh 3, abstract hits count up to 3 per keyword
    KeywordOverlap,
}

impl Default for ScoringMode {
    fn default() -> Self {
        if cfg!(feature = "bm25") {
            ScoringMode::Bm25
        } else {
            ScoringMode::KeywordOverlap
        }
    }
}

/// Relevance scorer shared by the snowball expander and ranking policy.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    mode: ScoringMode,
    k1: f64,
    b: f64,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(ScoringMode::default())
    }
}

impl RelevanceScorer {
    pub fn new(mode: ScoringMode) -> Self {
        Self {
            mode,
            k1: BM25_K1,
            b: BM25_B,
        }
    }

    /// Score one paper. Always `>= 0.0`; exactly `0.0` for empty input.
    pub fn score(&self, paper: &Paper, keywords: &[String]) -> f64 {
        if keywords.iter().all(|k| k.trim().is_empty()) {
            return 0.0;
        }
        if paper.title.trim().is_empty() && paper.abstract_text.trim().is_empty() {
            return 0.0;
        }

        match self.mode {
            ScoringMode::Bm25 => self.bm25(paper, keywords),
            ScoringMode::KeywordOverlap => keyword_overlap(paper, keywords),
        }
    }

    /// Score every paper, producing the next pipeline stage.
    pub fn score_all(&self, papers: Vec<Paper>, keywords: &[String]) -> Vec<ScoredPaper> {
        debug!(count = papers.len(), keywords = ?keywords, mode = ?self.mode, "Scoring papers");
        papers
            .into_iter()
            .map(|paper| {
                let lexical_score = self.score(&paper, keywords);
                ScoredPaper {
                    paper,
                    lexical_score,
                }
            })
            .collect()
    }

    fn bm25(&self, paper: &Paper, keywords: &[String]) -> f64 {
        let text = paper.scoring_text().to_lowercase();
        let document: Vec<&str> = text.split_whitespace().collect();
        if document.is_empty() {
            return 0.0;
        }

        let joined = keywords.join(" ").to_lowercase();
        let query = joined.split_whitespace();

        // One-document corpus: the document is its own average length.
        let doc_len = document.len() as f64;
        let avg_len = doc_len;
        let norm = self.k1 * (1.0 - self.b + self.b * doc_len / avg_len);

        query
            .map(|term| {
                let tf = document.iter().filter(|t| **t == term).count() as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                idf(1, 1) * tf * (self.k1 + 1.0) / (tf + norm)
            })
            .sum()
    }
}

/// Smoothed inverse document frequency; never negative.
fn idf(corpus_size: usize, doc_freq: usize) -> f64 {
    let n = corpus_size as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

fn keyword_overlap(paper: &Paper, keywords: &[String]) -> f64 {
    let title = paper.title.to_lowercase();
    let abstract_text = paper.abstract_text.to_lowercase();

    keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| {
            let title_hit = if title.contains(&k) {
                TITLE_HIT_WEIGHT
            } else {
                0.0
            };
            let abstract_hits = abstract_text.matches(&k).count().min(ABSTRACT_HIT_CAP);
            title_hit + abstract_hits as f64
        })
        .sum()
}
