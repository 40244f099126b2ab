//! Filter & rank policy applied to each directive's raw results.

use tracing::debug;

use crate::paper::{RankedPaper, ScoredPaper};

/// Older papers need strictly more citations than this to be kept
pub const MIN_CITATIONS_OLD: u64 = 10;

/// Papers from the last `RECENT_YEARS` years are always kept
pub const RECENT_YEARS: i32 = 1;

/// Whether a paper survives the retention rule.
pub fn is_retained(scored: &ScoredPaper, current_year: i32) -> bool {
    let paper = &scored.paper;
    paper.is_seed_anchor
        || paper.year >= current_year - RECENT_YEARS
        || paper.citation_count > MIN_CITATIONS_OLD
}

/// Blend lexical score, citations and recency.
pub fn final_score(lexical_score: f64, citation_count: u64, year: i32) -> f64 {
    let impact = (citation_count as f64 / 1000.0).min(5.0);
    let recency = ((year - 2000) as f64 / 20.0).max(0.0);
    if lexical_score > 0.0 {
        lexical_score + 0.3 * impact + 0.2 * recency
    } else {
        impact + 0.5 * recency
    }
}

/// Apply the retention rule, score and sort one directive's results.
pub fn apply(papers: Vec<ScoredPaper>, query_group: &str, current_year: i32) -> Vec<RankedPaper> {
    let total = papers.len();
    let mut ranked: Vec<RankedPaper> = papers
        .into_iter()
        .filter(|p| is_retained(p, current_year))
        .map(|scored| RankedPaper {
            final_score: final_score(
                scored.lexical_score,
                scored.paper.citation_count,
                scored.paper.year,
            ),
            lexical_score: scored.lexical_score,
            query_group: query_group.to_string(),
            paper: scored.paper,
        })
        .collect();

    if ranked.iter().any(|r| r.lexical_score > 0.0) {
        ranked.sort_by(|a, b| {
            b.lexical_score
                .total_cmp(&a.lexical_score)
                .then_with(|| b.final_score.total_cmp(&a.final_score))
        });
    } else {
        ranked.sort_by(|a, b| {
            b.paper
                .citation_count
                .cmp(&a.paper.citation_count)
                .then_with(|| b.paper.year.cmp(&a.paper.year))
        });
    }

    debug!(group = query_group, total, kept = ranked.len(), "Ranked directive results");
    ranked
}
