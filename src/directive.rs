//! Search directive model.
//!
//! A directive is one parsed search instruction: either a SEED (snowball
//! search from a loosely referenced paper, with a filter clause) or a QUERY
//! (direct keyword search). Both may carry a sort hint.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

use crate::paper::Paper;

/// Directive type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    Seed,
    Query,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Seed => "SEED",
            DirectiveKind::Query => "QUERY",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort preference attached to a directive with `SORT: "..."`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortHint {
    Citation,
    Relevance,
    Influence,
    Recency,
}

impl SortHint {
    /// Parse a SORT tag value (case-insensitive). Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "citation" => Some(SortHint::Citation),
            "relevance" => Some(SortHint::Relevance),
            "influence" => Some(SortHint::Influence),
            "recency" => Some(SortHint::Recency),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortHint::Citation => "citation",
            SortHint::Relevance => "relevance",
            SortHint::Influence => "influence",
            SortHint::Recency => "recency",
        }
    }

    /// Provider sort parameter for this hint. `Relevance` is the provider default.
    pub fn provider_sort(&self) -> Option<&'static str> {
        match self {
            SortHint::Citation | SortHint::Influence => Some("citationCount:desc"),
            SortHint::Recency => Some("year:desc"),
            SortHint::Relevance => None,
        }
    }
}

/// Kind-specific payload. SEED fields only exist on the SEED variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectiveBody {
    Seed {
        /// Loose paper reference, e.g. `"Vaswani 2017 attention"`
        reference: String,
        /// Raw filter clause, e.g. `Year > 2020 AND "graph neural"`
        filter: String,
    },
    Query,
}

/// A single parsed search instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Original directive text; `(kind, raw_text)` is the dedup identity
    pub raw_text: String,
    pub body: DirectiveBody,
    pub sort_hint: Option<SortHint>,
    /// Leading number from the source line (1-based, gaps preserved)
    pub ordinal: u32,
}

impl Directive {
    pub fn seed(reference: &str, filter: &str, sort_hint: Option<SortHint>, ordinal: u32) -> Self {
        Self {
            raw_text: format!("SEED: \"{}\" | FILTER: \"{}\"", reference, filter),
            body: DirectiveBody::Seed {
                reference: reference.to_string(),
                filter: filter.to_string(),
            },
            sort_hint,
            ordinal,
        }
    }

    pub fn query(text: &str, sort_hint: Option<SortHint>, ordinal: u32) -> Self {
        Self {
            raw_text: text.to_string(),
            body: DirectiveBody::Query,
            sort_hint,
            ordinal,
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self.body {
            DirectiveBody::Seed { .. } => DirectiveKind::Seed,
            DirectiveBody::Query => DirectiveKind::Query,
        }
    }

    pub fn seed_reference(&self) -> Option<&str> {
        match &self.body {
            DirectiveBody::Seed { reference, .. } => Some(reference),
            DirectiveBody::Query => None,
        }
    }

    pub fn filter_text(&self) -> Option<&str> {
        match &self.body {
            DirectiveBody::Seed { filter, .. } => Some(filter),
            DirectiveBody::Query => None,
        }
    }

    /// Identity used for de-duplication across parse zones.
    pub fn dedup_key(&self) -> (DirectiveKind, &str) {
        (self.kind(), self.raw_text.as_str())
    }

    /// Name recorded as `sort_method_applied` on produced papers.
    pub fn sort_method(&self) -> &'static str {
        self.sort_hint.map(|h| h.as_str()).unwrap_or("default")
    }

    /// Result group label: `SEED_3: <first 30 chars>...`
    pub fn group_label(&self, position: usize) -> String {
        let text = self.seed_reference().unwrap_or(&self.raw_text);
        let head: String = text.chars().take(30).collect();
        format!("{}_{}: {}...", self.kind(), position, head)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            DirectiveBody::Seed { reference, filter } => {
                write!(f, "SEED: '{}' | FILTER: '{}'", reference, filter)?
            }
            DirectiveBody::Query => write!(f, "QUERY: '{}'", self.raw_text)?,
        }
        if let Some(hint) = self.sort_hint {
            write!(f, " | SORT: '{}'", hint.as_str())?;
        }
        Ok(())
    }
}

/// Parse a raw SORT tag, warning on values we do not understand.
pub(crate) fn parse_sort_tag(raw: Option<&str>) -> Option<SortHint> {
    let raw = raw?.trim();
    let hint = SortHint::parse(raw);
    if hint.is_none() {
        warn!(sort = raw, "Unknown SORT value, using provider default");
    }
    hint
}

/// Words never treated as filter keywords
const FILTER_STOPWORDS: &[&str] = &["year", "and", "or", "not"];

fn year_patterns() -> &'static [(Regex, YearBound)] {
    static PATTERNS: OnceLock<Vec<(Regex, YearBound)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)Year\s*>\s*(\d{4})", YearBound::Min),
            (r"(?i)Year\s*<\s*(\d{4})", YearBound::Max),
            (r"(?i)Year\s*>=\s*(\d{4})", YearBound::Min),
            (r"(?i)Year\s*<=\s*(\d{4})", YearBound::Max),
        ]
        .into_iter()
        .filter_map(|(p, bound)| Regex::new(p).ok().map(|re| (re, bound)))
        .collect()
    })
}

fn quoted_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).ok()).as_ref()
}

fn bare_word_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([a-zA-Z]{3,})\b").ok()).as_ref()
}

#[derive(Debug, Clone, Copy)]
enum YearBound {
    Min,
    Max,
}

/// Constraint parsed from a SEED directive's filter clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    /// Ordered, case-insensitively unique keyword terms
    pub keywords: Vec<String>,
}

impl FilterSpec {
    /// Parse a filter clause such as `Year >= 2021 AND "graph neural" attention`.
    pub fn parse(filter: &str) -> Self {
        let mut spec = FilterSpec::default();
        if filter.trim().is_empty() {
            return spec;
        }

        for (re, bound) in year_patterns() {
            let year = re
                .captures(filter)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok());
            if let Some(year) = year {
                match bound {
                    YearBound::Min => spec.year_min = Some(year),
                    YearBound::Max => spec.year_max = Some(year),
                }
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut leftover = filter.to_string();

        if let Some(re) = quoted_regex() {
            for caps in re.captures_iter(filter) {
                if let Some(phrase) = caps.get(1) {
                    let phrase = phrase.as_str().trim();
                    if !phrase.to_lowercase().starts_with("year") {
                        spec.push_keyword(phrase, &mut seen);
                    }
                }
            }
            leftover = re.replace_all(filter, " ").into_owned();
        }

        if let Some(re) = bare_word_regex() {
            for caps in re.captures_iter(&leftover) {
                if let Some(word) = caps.get(1) {
                    let word = word.as_str();
                    if !FILTER_STOPWORDS.contains(&word.to_lowercase().as_str()) {
                        spec.push_keyword(word, &mut seen);
                    }
                }
            }
        }

        spec
    }

    fn push_keyword(&mut self, keyword: &str, seen: &mut HashSet<String>) {
        if keyword.is_empty() {
            return;
        }
        if seen.insert(keyword.to_lowercase()) {
            self.keywords.push(keyword.to_string());
        }
    }

    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }

    /// Year-bound check. Unknown years (0) never fail; keywords never reject.
    pub fn matches(&self, paper: &Paper) -> bool {
        let year = paper.year;
        if year <= 0 {
            return true;
        }
        if self.year_min.is_some_and(|min| year < min) {
            return false;
        }
        if self.year_max.is_some_and(|max| year > max) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper_with_year(year: i32) -> Paper {
        Paper {
            title: "t".to_string(),
            year,
            ..Default::default()
        }
    }

    #[test]
    fn test_year_min_rejects_older_papers() {
        let spec = FilterSpec::parse("Year >= 2021");
        assert_eq!(spec.year_min, Some(2021));
        assert!(!spec.matches(&paper_with_year(2019)));
        assert!(spec.matches(&paper_with_year(2021)));
        assert!(spec.matches(&paper_with_year(2024)));
    }

    #[test]
    fn test_unknown_year_never_rejected() {
        let spec = FilterSpec::parse("Year > 2020 AND Year < 2022");
        assert_eq!(spec.year_min, Some(2020));
        assert_eq!(spec.year_max, Some(2022));
        assert!(spec.matches(&paper_with_year(0)));
        assert!(!spec.matches(&paper_with_year(2023)));
        assert!(spec.matches(&paper_with_year(2022)));
    }

    #[test]
    fn test_quoted_phrases_come_before_bare_words() {
        let spec = FilterSpec::parse(r#"Year > 2020 AND "graph neural" OR attention, Graph"#);
        assert_eq!(spec.keywords, vec!["graph neural", "attention", "Graph"]);

        let spec = FilterSpec::parse(r#""Transformer" and transformer not in"#);
        assert_eq!(spec.keywords, vec!["Transformer"]);
    }

    #[test]
    fn test_empty_filter() {
        let spec = FilterSpec::parse("   ");
        assert_eq!(spec, FilterSpec::default());
        assert!(!spec.has_keywords());
    }

    #[test]
    fn test_sort_hint_mapping() {
        assert_eq!(SortHint::parse("Recency"), Some(SortHint::Recency));
        assert_eq!(SortHint::Recency.provider_sort(), Some("year:desc"));
        assert_eq!(SortHint::Influence.provider_sort(), Some("citationCount:desc"));
        assert_eq!(SortHint::Relevance.provider_sort(), None);
        assert_eq!(SortHint::parse("newest"), None);
    }

    #[test]
    fn test_directive_fields_follow_kind() {
        let seed = Directive::seed("Smith 2020 transformers", "Year > 2020", None, 3);
        assert_eq!(seed.kind(), DirectiveKind::Seed);
        assert_eq!(seed.seed_reference(), Some("Smith 2020 transformers"));
        assert_eq!(seed.raw_text, r#"SEED: "Smith 2020 transformers" | FILTER: "Year > 2020""#);

        let query = Directive::query("graph neural networks", Some(SortHint::Recency), 1);
        assert_eq!(query.seed_reference(), None);
        assert_eq!(query.filter_text(), None);
        assert_eq!(query.sort_method(), "recency");
        assert_eq!(query.group_label(2), "QUERY_2: graph neural networks...");
    }
}
