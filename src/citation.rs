//! GB/T 7714-2015 reference strings.

use crate::paper::Paper;

/// Authors listed before truncating with "et al"
const MAX_LISTED_AUTHORS: usize = 3;

const THESIS_MARKERS: &[&str] = &["thesis", "dissertation", "博士", "硕士", "学位论文"];
const CONFERENCE_MARKERS: &[&str] = &[
    "conference",
    "proceedings",
    "workshop",
    "symposium",
    "会议",
    "研讨会",
];
const BOOK_MARKERS: &[&str] = &["press", "publisher", "出版社"];

/// Document type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    /// `[J]` journal article
    Journal,
    /// `[C]` conference paper
    Conference,
    /// `[M]` monograph
    Book,
    /// `[D]` thesis
    Thesis,
}

impl DocumentType {
    pub fn code(&self) -> char {
        match self {
            DocumentType::Journal => 'J',
            DocumentType::Conference => 'C',
            DocumentType::Book => 'M',
            DocumentType::Thesis => 'D',
        }
    }

    /// Guess the type from venue and title wording.
    pub fn detect(paper: &Paper) -> Self {
        let venue = paper.venue.to_lowercase();
        let title = paper.title.to_lowercase();

        if THESIS_MARKERS
            .iter()
            .any(|m| venue.contains(m) || title.contains(m))
        {
            DocumentType::Thesis
        } else if CONFERENCE_MARKERS.iter().any(|m| venue.contains(m)) {
            DocumentType::Conference
        } else if BOOK_MARKERS.iter().any(|m| venue.contains(m)) {
            DocumentType::Book
        } else {
            DocumentType::Journal
        }
    }
}

fn is_cjk(name: &str) -> bool {
    name.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// `Ashish Vaswani` → `Vaswani A.`; CJK names are kept as written.
fn format_author(name: &str) -> String {
    let name = name.trim();
    if is_cjk(name) {
        return name.to_string();
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.split_last() {
        Some((surname, given)) if !given.is_empty() => {
            let initials: String = given
                .iter()
                .filter_map(|p| p.chars().next())
                .map(|c| format!("{}.", c.to_uppercase()))
                .collect();
            format!("{} {}", surname, initials)
        }
        _ => name.to_string(),
    }
}

fn format_authors(authors: &[String]) -> String {
    let listed: Vec<String> = authors
        .iter()
        .filter(|a| !a.trim().is_empty())
        .take(MAX_LISTED_AUTHORS)
        .map(|a| format_author(a))
        .collect();

    let mut out = listed.join(", ");
    if authors.len() > MAX_LISTED_AUTHORS {
        if authors.first().is_some_and(|a| is_cjk(a)) {
            out.push_str(", 等");
        } else {
            out.push_str(", et al");
        }
    }
    out
}

/// Format a paper as a GB/T 7714 reference.
pub fn format_gbt7714(paper: &Paper) -> String {
    let doc_type = DocumentType::detect(paper);
    let mut parts = Vec::new();

    // The segment separator supplies the closing period of the last initial.
    let authors = format_authors(&paper.authors);
    let authors = authors.trim_end_matches('.');
    if !authors.is_empty() {
        parts.push(authors.to_string());
    }

    if !paper.title.is_empty() {
        parts.push(format!("{}[{}]", paper.title, doc_type.code()));
    }

    let year = (paper.year > 0).then(|| paper.year.to_string());
    if !paper.venue.is_empty() {
        match doc_type {
            DocumentType::Book | DocumentType::Thesis => parts.push(paper.venue.clone()),
            DocumentType::Journal | DocumentType::Conference => {
                let mut segment = vec![paper.venue.clone()];
                segment.extend(year);
                if !paper.volume.is_empty() {
                    if paper.issue.is_empty() {
                        segment.push(paper.volume.clone());
                    } else {
                        segment.push(format!("{}({})", paper.volume, paper.issue));
                    }
                }
                if !paper.pages.is_empty() {
                    segment.push(paper.pages.clone());
                }
                parts.push(segment.join(", "));
            }
        }
    } else if let Some(year) = year {
        parts.push(year);
    }

    if !paper.doi.is_empty() {
        parts.push(format!("https://doi.org/{}", paper.doi));
    }

    parts.join(". ")
}
