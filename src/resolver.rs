//! Seed resolution: turn a loose reference like `"Vaswani 2017 attention"`
//! into one concrete paper from the citation graph.

use tracing::{debug, info, warn};

use crate::paper::Paper;
use crate::provider::{CitationGraph, SeedCandidate};

/// Candidates requested from the broad search
pub const CANDIDATE_LIMIT: usize = 10;

/// Scores below this are resolved but flagged low-confidence
pub const LOW_CONFIDENCE_THRESHOLD: u32 = 50;

const YEAR_MATCH_POINTS: u32 = 50;
const AUTHOR_MATCH_POINTS: u32 = 30;
const KEYWORD_MATCH_POINTS: u32 = 5;

/// Heuristic reading of a seed reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReference {
    /// First token, taken as the first author's surname
    pub author: Option<String>,
    pub year: Option<i32>,
    /// Remaining non-numeric tokens; only set for references of 3+ tokens
    pub keywords: Vec<String>,
}

fn is_year_token(token: &str) -> bool {
    token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
}

/// Split a seed reference into author, year and title keywords.
pub fn parse_seed_reference(text: &str) -> SeedReference {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let author = tokens.first().map(|t| t.to_string());
    let year = tokens
        .iter()
        .rev()
        .find(|t| is_year_token(t))
        .and_then(|t| t.parse().ok());

    let keywords = if tokens.len() >= 3 {
        tokens[1..]
            .iter()
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
            .filter(|t| Some(t.to_lowercase()) != author.as_ref().map(|a| a.to_lowercase()))
            .map(|t| t.to_string())
            .collect()
    } else {
        Vec::new()
    };

    SeedReference {
        author,
        year,
        keywords,
    }
}

/// Match strength of one candidate against a parsed reference.
///
/// +50 for an exact year, +30 when the first author contains the parsed
/// author (case-insensitive), +5 for every keyword found in the title.
pub fn match_score(candidate: &SeedCandidate, reference: &SeedReference) -> u32 {
    let mut score = 0;

    if reference.year.is_some_and(|y| y == candidate.year) {
        score += YEAR_MATCH_POINTS;
    }

    if let (Some(author), Some(first)) = (&reference.author, candidate.first_author()) {
        if first.to_lowercase().contains(&author.to_lowercase()) {
            score += AUTHOR_MATCH_POINTS;
        }
    }

    let title = candidate.title.to_lowercase();
    let hits = reference
        .keywords
        .iter()
        .filter(|k| title.contains(&k.to_lowercase()))
        .count() as u32;

    score + hits * KEYWORD_MATCH_POINTS
}

/// A resolved seed paper.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Full record, marked as seed anchor
    pub anchor: Paper,
    pub candidate: SeedCandidate,
    pub confidence: u32,
    pub low_confidence: bool,
}

/// Pick the best candidate; ties keep the earliest.
pub fn best_candidate(
    candidates: &[SeedCandidate],
    reference: &SeedReference,
) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = match_score(candidate, reference);
        debug!(title = %candidate.title, score, "Seed candidate");
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((idx, score));
        }
    }
    best
}

/// Resolve `seed_text` to a paper. Returns `None` when the search fails or
/// finds nothing.
pub async fn resolve(graph: &dyn CitationGraph, seed_text: &str) -> Option<Resolution> {
    let candidates = match graph.candidates(seed_text, CANDIDATE_LIMIT).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(seed = seed_text, error = %e, "Seed search failed");
            return None;
        }
    };

    let reference = parse_seed_reference(seed_text);
    let Some((idx, confidence)) = best_candidate(&candidates, &reference) else {
        warn!(seed = seed_text, "No candidates found for seed");
        return None;
    };
    let candidate = candidates[idx].clone();

    let low_confidence = confidence < LOW_CONFIDENCE_THRESHOLD;
    if low_confidence {
        warn!(
            seed = seed_text,
            title = %candidate.title,
            confidence,
            "Low confidence seed match"
        );
    } else {
        info!(seed = seed_text, title = %candidate.title, confidence, "Resolved seed paper");
    }

    let anchor = match graph.detail_of(&candidate.paper_id).await {
        Ok(paper) => paper,
        Err(e) => {
            warn!(paper_id = %candidate.paper_id, error = %e, "Failed to fetch seed details, using search record");
            candidate.to_paper()
        }
    };

    Some(Resolution {
        anchor: anchor.into_seed_anchor(),
        candidate,
        confidence,
        low_confidence,
    })
}
