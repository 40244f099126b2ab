//! Directive extraction from search plan text.
//!
//! Plans are loosely structured Markdown. Directives are numbered lines in
//! one of these shapes:
//!
//! ```text
//! 1. SEED: "Vaswani 2017 attention" | FILTER: Year >= 2020 AND "long context" | SORT: "recency"
//! 2. QUERY: "graph neural networks" | SORT: "citation"
//! 3. `QUERY: retrieval augmented generation`      (legacy backtick form)
//! ```
//!
//! The grammar is layered: the structured SEED/QUERY matchers run first and
//! the legacy backtick matcher only runs when they produced nothing. Layers
//! never merge.
//!
//! A plan may start with a priority zone (a heading naming the human
//! override zone, up to the next `---`). Directives found there win over
//! identical directives elsewhere in the file.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::directive::{parse_sort_tag, Directive, DirectiveKind};
use crate::error::Result;

/// Bodies that are template placeholders, never real directives
const PLACEHOLDER_MARKER: &str = "在此处添加";
const ELLIPSIS: &str = "...";

type Matcher = fn(&str) -> Vec<Directive>;

/// Grammar layers, tried in order. Matchers within a layer are combined.
const LAYERS: &[(&str, &[Matcher])] = &[
    (
        "structured",
        &[match_seed_lines as Matcher, match_query_lines as Matcher],
    ),
    ("legacy", &[match_legacy_lines as Matcher]),
];

struct Patterns {
    seed: Regex,
    query: Regex,
    legacy: Regex,
    legacy_seed: Regex,
    legacy_query: Regex,
    priority_zone: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                seed: Regex::new(
                    r#"(?m)(\d+)\.\s*SEED:\s*"([^"]+)"\s*\|\s*FILTER:\s*(.+?)(?:\s*\|\s*SORT:\s*"([^"]+)")?[ \t]*$"#,
                )
                .ok()?,
                query: Regex::new(
                    r#"(?m)(\d+)\.\s*QUERY:\s*(.+?)(?:\s*\|\s*SORT:\s*"([^"]+)")?[ \t]*$"#,
                )
                .ok()?,
                legacy: Regex::new(r"(\d+)\.\s*`([^`]+)`").ok()?,
                legacy_seed: Regex::new(r#"(?i)^SEED:\s*"([^"]+)"\s*\|\s*FILTER:\s*"([^"]*)""#)
                    .ok()?,
                legacy_query: Regex::new(r"(?i)^QUERY:\s*(.+)").ok()?,
                priority_zone: Regex::new(r"(?is)#[^\n]*(?:人类最高指令区|Human Override Zone).*?---")
                    .ok()?,
            })
        })
        .as_ref()
}

/// Parse a whole search plan: priority zone first, then the rest of the
/// text, de-duplicated by `(kind, raw_text)`.
pub fn parse_directives(text: &str) -> Vec<Directive> {
    let text = text.replace("\r\n", "\n");

    let priority = match priority_zone(&text) {
        Some(zone) => {
            let found = parse_text(zone);
            info!(count = found.len(), "Found directives in priority zone");
            found
        }
        None => Vec::new(),
    };
    let everywhere = parse_text(&text);

    let mut seen: HashSet<(DirectiveKind, String)> = HashSet::new();
    let directives: Vec<Directive> = priority
        .into_iter()
        .chain(everywhere)
        .filter(|d| seen.insert((d.kind(), d.raw_text.clone())))
        .collect();

    let seeds = directives
        .iter()
        .filter(|d| d.kind() == DirectiveKind::Seed)
        .count();
    info!(
        total = directives.len(),
        seed = seeds,
        query = directives.len() - seeds,
        "Extracted directives"
    );

    directives
}

/// Read and parse a search plan file.
pub fn read_directives(path: &Path) -> Result<Vec<Directive>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_directives(&content))
}

/// The priority zone slice of `text`, if the plan has one.
pub fn priority_zone(text: &str) -> Option<&str> {
    patterns()?.priority_zone.find(text).map(|m| m.as_str())
}

/// Run the layered grammar over one block of text.
pub fn parse_text(text: &str) -> Vec<Directive> {
    for (name, matchers) in LAYERS {
        let found: Vec<Directive> = matchers.iter().flat_map(|m| m(text)).collect();
        if !found.is_empty() {
            debug!(layer = name, count = found.len(), "Grammar layer matched");
            return found;
        }
    }
    Vec::new()
}

fn match_seed_lines(text: &str) -> Vec<Directive> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    p.seed
        .captures_iter(text)
        .filter_map(|caps| {
            let ordinal = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let reference = caps.get(2)?.as_str().trim();
            let filter = strip_enclosing_quotes(caps.get(3)?.as_str().trim());
            let sort = parse_sort_tag(caps.get(4).map(|m| m.as_str()));
            Some(Directive::seed(reference, filter, sort, ordinal))
        })
        .collect()
}

fn match_query_lines(text: &str) -> Vec<Directive> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    p.query
        .captures_iter(text)
        .filter_map(|caps| {
            let ordinal = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let query = strip_enclosing_quotes(caps.get(2)?.as_str().trim());
            if is_placeholder(query) {
                return None;
            }
            let sort = parse_sort_tag(caps.get(3).map(|m| m.as_str()));
            Some(Directive::query(query, sort, ordinal))
        })
        .collect()
}

fn match_legacy_lines(text: &str) -> Vec<Directive> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    p.legacy
        .captures_iter(text)
        .filter_map(|caps| {
            let ordinal = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let body = caps.get(2)?.as_str().trim();
            if is_placeholder(body) {
                return None;
            }

            if let Some(seed) = p.legacy_seed.captures(body) {
                let reference = seed.get(1)?.as_str();
                let filter = seed.get(2).map(|m| m.as_str()).unwrap_or("");
                return Some(Directive {
                    raw_text: body.to_string(),
                    ..Directive::seed(reference, filter, None, ordinal)
                });
            }

            if let Some(query) = p.legacy_query.captures(body) {
                let mut extracted = query.get(1)?.as_str().trim();
                if extracted.len() >= 2 && extracted.starts_with('"') && extracted.ends_with('"') {
                    extracted = &extracted[1..extracted.len() - 1];
                }
                return Some(Directive::query(extracted, None, ordinal));
            }

            Some(Directive::query(body, None, ordinal))
        })
        .collect()
}

/// Strip one enclosing quote pair when the value is exactly one quoted string.
fn strip_enclosing_quotes(value: &str) -> &str {
    if value.len() >= 2
        && value.starts_with('"')
        && value.ends_with('"')
        && value.matches('"').count() == 2
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn is_placeholder(body: &str) -> bool {
    body.contains(PLACEHOLDER_MARKER) || body == ELLIPSIS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::SortHint;

    const PLAN: &str = r#"# 🧑‍💻 人类最高指令区
1. QUERY: "diffusion models" | SORT: "citation"
2. QUERY: 在此处添加你的查询
---

## Auto-generated plan

1. SEED: "Vaswani 2017 attention" | FILTER: "Year >= 2020 AND efficient" | SORT: "recency"
3. SEED: "Kipf 2016 graph" | FILTER: Year > 2019
4. SEED: "Broken 2020 line"
5. QUERY: "diffusion models" | SORT: "citation"
7. QUERY: graph neural networks
8. QUERY: ...
"#;

    #[test]
    fn test_priority_zone_precedence() {
        let directives = parse_directives(PLAN);
        let raws: Vec<&str> = directives.iter().map(|d| d.raw_text.as_str()).collect();
        assert_eq!(
            raws,
            vec![
                "diffusion models",
                r#"SEED: "Vaswani 2017 attention" | FILTER: "Year >= 2020 AND efficient""#,
                r#"SEED: "Kipf 2016 graph" | FILTER: "Year > 2019""#,
                "graph neural networks",
            ]
        );
        assert_eq!(directives[0].ordinal, 1);
        assert_eq!(directives[0].sort_hint, Some(SortHint::Citation));
    }

    #[test]
    fn test_seed_line_fields() {
        let directives = parse_text(PLAN);
        let seed = &directives[0];
        assert_eq!(seed.kind(), DirectiveKind::Seed);
        assert_eq!(seed.seed_reference(), Some("Vaswani 2017 attention"));
        assert_eq!(seed.filter_text(), Some("Year >= 2020 AND efficient"));
        assert_eq!(seed.sort_hint, Some(SortHint::Recency));

        let unquoted = &directives[1];
        assert_eq!(unquoted.ordinal, 3);
        assert_eq!(unquoted.filter_text(), Some("Year > 2019"));
        assert_eq!(unquoted.sort_hint, None);
    }

    #[test]
    fn test_malformed_seed_and_placeholders_dropped() {
        let directives = parse_text(PLAN);
        assert!(directives
            .iter()
            .all(|d| d.seed_reference() != Some("Broken 2020 line")));
        assert!(directives.iter().all(|d| d.raw_text != "..."));
        assert!(directives
            .iter()
            .all(|d| !d.raw_text.contains(PLACEHOLDER_MARKER)));
    }

    #[test]
    fn test_ordinal_gaps_preserved() {
        let ordinals: Vec<u32> = parse_text(PLAN).iter().map(|d| d.ordinal).collect();
        assert_eq!(ordinals, vec![1, 3, 1, 5, 7]);
    }

    #[test]
    fn test_legacy_layer_only_without_structured_matches() {
        let legacy = "1. `SEED: \"Hinton 2006 deep\" | FILTER: \"Year > 2010\"`\n\
                      2. `QUERY: \"contrastive learning\"`\n\
                      4. `self-supervised vision`\n";
        let directives = parse_directives(legacy);
        assert_eq!(directives.len(), 3);
        assert_eq!(directives[0].kind(), DirectiveKind::Seed);
        assert_eq!(
            directives[0].raw_text,
            r#"SEED: "Hinton 2006 deep" | FILTER: "Year > 2010""#
        );
        assert_eq!(directives[0].filter_text(), Some("Year > 2010"));
        assert_eq!(directives[1].raw_text, "contrastive learning");
        assert_eq!(directives[2].raw_text, "self-supervised vision");
        assert_eq!(directives[2].ordinal, 4);

        let mixed = format!("{}9. QUERY: transformers\n", legacy);
        let directives = parse_directives(&mixed);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].raw_text, "transformers");
    }

    #[test]
    fn test_parsing_is_deterministic() {
        assert_eq!(parse_directives(PLAN), parse_directives(PLAN));
    }

    #[test]
    fn test_crlf_input() {
        let directives = parse_directives("1. QUERY: \"graph\" | SORT: \"recency\"\r\n2. QUERY: mesh\r\n");
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].raw_text, "graph");
        assert_eq!(directives[0].sort_hint, Some(SortHint::Recency));
        assert_eq!(directives[1].raw_text, "mesh");
    }

    #[test]
    fn test_read_directives_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plan.md");
        std::fs::write(&path, PLAN)?;
        assert_eq!(read_directives(&path)?.len(), 4);
        Ok(())
    }
}
