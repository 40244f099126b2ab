//! Crawler configuration.
//!
//! Holds the per-run knobs (result cap, fallback policy, pacing) and resolves
//! the Semantic Scholar API key from the command line, the environment or a
//! JSON config file.

use crate::error::{CrawlerError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable holding the Semantic Scholar API key
pub const API_KEY_ENV: &str = "SEMANTIC_SCHOLAR_API_KEY";

/// Key inside the JSON config file
const API_KEY_CONFIG_FIELD: &str = "semantic_scholar_api_key";

/// Default per-directive result cap
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Default config file: `<config_dir>/scholar-crawler/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("scholar-crawler").join("config.json"))
}

/// Inclusive interval (seconds) a pause is sampled from uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Err(CrawlerError::Validation(format!("{} delay must be finite", name)));
        }
        if self.min_secs < 0.0 {
            return Err(CrawlerError::Validation(format!(
                "{} delay must not be negative (got {})",
                name, self.min_secs
            )));
        }
        if self.min_secs > self.max_secs {
            return Err(CrawlerError::Validation(format!(
                "{} delay min {} exceeds max {}",
                name, self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }

    /// Draw one delay from the interval.
    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Request pacing. These delays keep the crawler under the providers' rate
/// limits and make scraper traffic look less automated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Before every primary API call. 1.1 s matches the 1 request/s limit.
    pub primary: DelayRange,
    /// Before the scraping provider is first used for a query.
    pub secondary_warmup: DelayRange,
    /// Between successive items pulled from the scraping provider.
    pub secondary_item: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            primary: DelayRange::new(1.1, 1.1),
            secondary_warmup: DelayRange::new(5.0, 10.0),
            secondary_item: DelayRange::new(2.0, 4.0),
        }
    }
}

impl PacingConfig {
    /// No pauses at all (tests, dry runs)
    pub fn none() -> Self {
        Self {
            primary: DelayRange::zero(),
            secondary_warmup: DelayRange::zero(),
            secondary_item: DelayRange::zero(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.primary.validate("primary")?;
        self.secondary_warmup.validate("secondary warmup")?;
        self.secondary_item.validate("secondary item")
    }
}

/// Sleep for a duration sampled from `range`.
pub async fn pause(range: &DelayRange) {
    let delay = range.sample();
    if !delay.is_zero() {
        debug!(delay_ms = delay.as_millis() as u64, "Pacing delay");
        tokio::time::sleep(delay).await;
    }
}

/// When the scraping provider is consulted for QUERY directives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Only when the primary provider under-delivers
    #[default]
    Auto,
    /// Never
    Disabled,
    /// Always, skipping the primary provider
    SecondaryOnly,
}

/// Run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub api_key: Option<String>,
    pub max_results: usize,
    pub output_dir: PathBuf,
    pub pacing: PacingConfig,
    pub fallback: FallbackPolicy,
    pub exact_title: bool,
    /// Provider sort used when a directive has no mappable SORT hint
    pub sort_override: Option<String>,
    pub cookie_path: Option<PathBuf>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
            output_dir: PathBuf::from("./"),
            pacing: PacingConfig::default(),
            fallback: FallbackPolicy::Auto,
            exact_title: false,
            sort_override: None,
            cookie_path: None,
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        self.pacing.validate()?;
        if self.max_results == 0 {
            return Err(CrawlerError::Validation(
                "max results must be at least 1".to_string(),
            ));
        }
        if let Some(sort) = &self.sort_override {
            if !SORT_OVERRIDES.contains(&sort.as_str()) {
                return Err(CrawlerError::Validation(format!(
                    "unsupported sort '{}', expected one of {:?}",
                    sort, SORT_OVERRIDES
                )));
            }
        }
        Ok(())
    }

    /// Provider sort parameter from `--sort-by`; `relevance` means unset.
    pub fn provider_sort_override(&self) -> Option<&str> {
        self.sort_override
            .as_deref()
            .filter(|s| *s != "relevance")
    }
}

/// Accepted `--sort-by` values
pub const SORT_OVERRIDES: &[&str] = &[
    "relevance",
    "citationCount:desc",
    "citationCount:asc",
    "year:desc",
    "year:asc",
];

/// Resolve the API key: explicit value, then environment, then config file.
pub fn resolve_api_key(explicit: Option<&str>, config_path: Option<&Path>) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            debug!("Using API key from {}", API_KEY_ENV);
            return Some(key.trim().to_string());
        }
    }

    let path = config_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)?;
    match read_api_key_file(&path) {
        Ok(key) => key,
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read config file");
            None
        }
    }
}

fn read_api_key_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let key = value
        .get(API_KEY_CONFIG_FIELD)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);
    if key.is_some() {
        info!(path = ?path, "Loaded API key from config file");
    }
    Ok(key)
}
