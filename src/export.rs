//! CSV export and Markdown report.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::citation::format_gbt7714;
use crate::error::Result;
use crate::paper::RankedPaper;

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_ABSTRACT_CHARS: usize = 200;
const REPORT_ABSTRACT_CHARS: usize = 300;
const REPORT_TOP_PAPERS: usize = 3;
const REPORT_LISTED_AUTHORS: usize = 3;

/// One CSV row; field order is the column order.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Query_Group")]
    query_group: &'a str,
    #[serde(rename = "Directive_Type")]
    directive_type: &'a str,
    #[serde(rename = "Seed_Paper")]
    seed_paper: &'a str,
    #[serde(rename = "Filter_Applied")]
    filter_applied: &'a str,
    #[serde(rename = "Sort_Method")]
    sort_method: &'a str,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Authors")]
    authors: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Citations")]
    citations: u64,
    #[serde(rename = "BM25_Score")]
    bm25_score: f64,
    #[serde(rename = "Abstract_Summary")]
    abstract_summary: String,
    #[serde(rename = "Link")]
    link: &'a str,
    #[serde(rename = "Venue")]
    venue: &'a str,
    #[serde(rename = "DOI")]
    doi: &'a str,
    #[serde(rename = "Volume")]
    volume: &'a str,
    #[serde(rename = "Issue")]
    issue: &'a str,
    #[serde(rename = "Pages")]
    pages: &'a str,
    #[serde(rename = "Citation_GB")]
    citation_gb: String,
    #[serde(rename = "Source")]
    source: &'static str,
    #[serde(rename = "Relevance_Score")]
    relevance_score: f64,
}

impl<'a> CsvRow<'a> {
    fn from_ranked(ranked: &'a RankedPaper) -> Self {
        let paper = &ranked.paper;
        Self {
            query_group: &ranked.query_group,
            directive_type: paper.directive_type(),
            seed_paper: &paper.originating_seed,
            filter_applied: &paper.filter_applied,
            sort_method: &paper.sort_method_applied,
            title: &paper.title,
            authors: paper.authors.join("; "),
            year: year_cell(paper.year),
            citations: paper.citation_count,
            bm25_score: round2(ranked.lexical_score),
            abstract_summary: summarize(&paper.abstract_text, CSV_ABSTRACT_CHARS),
            link: &paper.url,
            venue: &paper.venue,
            doi: &paper.doi,
            volume: &paper.volume,
            issue: &paper.issue,
            pages: &paper.pages,
            citation_gb: format_gbt7714(paper),
            source: paper.source_provider.label(),
            relevance_score: round2(ranked.final_score),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn year_cell(year: i32) -> String {
    if year > 0 {
        year.to_string()
    } else {
        String::new()
    }
}

/// First `max_chars` characters, with `...` appended when cut.
fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write all ranked papers to a CSV file.
///
/// # Returns
///
/// The written path, or `None` when there was nothing to write
pub fn write_csv(papers: &[RankedPaper], path: &Path) -> Result<Option<PathBuf>> {
    if papers.is_empty() {
        warn!("No papers to export");
        return Ok(None);
    }

    create_parent_dir(path)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);
    for ranked in papers {
        wtr.serialize(CsvRow::from_ranked(ranked))?;
    }
    wtr.flush()?;

    info!(count = papers.len(), path = ?path, "Saved CSV");
    Ok(Some(path.to_path_buf()))
}

/// Render the Markdown run report.
pub fn render_report(papers: &[RankedPaper], generated_at: NaiveDateTime) -> String {
    let seed_count = papers
        .iter()
        .filter(|r| r.paper.directive_type() == "SEED")
        .count();

    let mut lines: Vec<String> = Vec::new();
    lines.push("# Academic Literature Crawler Report".to_string());
    lines.push(format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S")));
    lines.push(format!("Total papers collected: {}", papers.len()));
    lines.push(format!("- SEED search results: {}", seed_count));
    lines.push(format!("- QUERY search results: {}", papers.len() - seed_count));
    lines.push(String::new());
    lines.push("## Top 3 Must-Read Papers".to_string());
    lines.push(String::new());

    let mut top: Vec<&RankedPaper> = papers.iter().collect();
    top.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.paper.citation_count.cmp(&a.paper.citation_count))
    });

    for (i, ranked) in top.iter().take(REPORT_TOP_PAPERS).enumerate() {
        let paper = &ranked.paper;
        let mut authors = paper
            .authors
            .iter()
            .take(REPORT_LISTED_AUTHORS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if paper.authors.len() > REPORT_LISTED_AUTHORS {
            authors.push_str(" et al.");
        }
        let year = if paper.year > 0 {
            paper.year.to_string()
        } else {
            "Unknown".to_string()
        };
        let venue = if paper.venue.is_empty() {
            "Unknown"
        } else {
            paper.venue.as_str()
        };
        let summary: String = if paper.abstract_text.is_empty() {
            "No abstract available.".to_string()
        } else {
            paper.abstract_text.chars().take(REPORT_ABSTRACT_CHARS).collect()
        };

        lines.push(format!("### {}. {}", i + 1, paper.title));
        lines.push(format!("- **Type**: {}", paper.directive_type()));
        lines.push(format!("- **Authors**: {}", authors));
        lines.push(format!("- **Year**: {}", year));
        lines.push(format!("- **Citations**: {}", paper.citation_count));
        lines.push(format!("- **BM25 Score**: {:.2}", ranked.lexical_score));
        lines.push(format!("- **Venue**: {}", venue));
        lines.push(format!("- **Source**: {}", paper.source_provider));
        lines.push(format!("- **Relevance Score**: {:.2}", ranked.final_score));
        lines.push(format!("- **Link**: {}", paper.url));
        lines.push(String::new());
        lines.push("**Abstract Summary**:".to_string());
        lines.push(format!("{}...", summary));
        lines.push(String::new());
    }

    lines.push("## Query Group Statistics".to_string());
    lines.push(String::new());
    let mut groups: Vec<(&str, usize)> = Vec::new();
    for ranked in papers {
        match groups.iter_mut().find(|(g, _)| *g == ranked.query_group) {
            Some((_, count)) => *count += 1,
            None => groups.push((ranked.query_group.as_str(), 1)),
        }
    }
    for (group, count) in groups {
        lines.push(format!("- **{}**: {} papers", group, count));
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Write the Markdown report. `None` when there is nothing to report.
pub fn write_report(
    papers: &[RankedPaper],
    path: &Path,
    generated_at: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    if papers.is_empty() {
        warn!("No papers to generate report");
        return Ok(None);
    }

    create_parent_dir(path)?;
    std::fs::write(path, render_report(papers, generated_at))?;
    info!(path = ?path, "Saved report");
    Ok(Some(path.to_path_buf()))
}
