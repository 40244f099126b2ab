//! # scholar_crawler
//!
//! Directive-driven academic literature crawler.
//!
//! A directive file lists SEED directives (snowball search from a loosely
//! referenced paper) and QUERY directives (keyword search). Each directive
//! is executed against Semantic Scholar, with Google Scholar scraping as a
//! fallback for thin keyword results, then filtered, ranked and exported to
//! CSV plus a Markdown report.
//!
//! ## Modules
//!
//! - [`parser`] - Directive text parsing
//! - [`directive`] - Directive, sort hint and filter clause types
//! - [`resolver`] - Seed paper resolution
//! - [`snowball`] - Citing-paper expansion
//! - [`search`] - Primary/fallback query orchestration
//! - [`scorer`] - BM25 relevance scoring
//! - [`ranking`] - Retention rule and final scores
//! - [`pipeline`] - Sequential directive execution
//! - [`semanticscholar`] - Semantic Scholar API client
//! - [`gscholar`] - Google Scholar scraping fallback
//! - [`export`] - CSV and Markdown output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholar_crawler::{config::CrawlerConfig, parser, pipeline::Crawler};
//! use scholar_crawler::semanticscholar::SemanticScholarClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CrawlerConfig::default();
//!     let client = SemanticScholarClient::new(None, config.pacing.primary)?;
//!     let directives = parser::parse_directives("1. QUERY: \"graph neural networks\"");
//!
//!     let papers = Crawler::new(&config, &client, &client, None)
//!         .run(&directives)
//!         .await;
//!     println!("Collected {} papers", papers.len());
//!     Ok(())
//! }
//! ```

pub mod citation;
pub mod config;
pub mod cookies;
pub mod directive;
pub mod error;
pub mod export;
pub mod gscholar;
pub mod paper;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod resolver;
pub mod scorer;
pub mod search;
pub mod semanticscholar;
pub mod snowball;

pub use error::{CrawlerError, Result};
