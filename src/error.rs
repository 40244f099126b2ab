//! Error type shared by the crawler library.
//!
//! Provider failures are downgraded to warnings at the directive boundary,
//! so only setup errors (bad config, unwritable output) reach the binary.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Transport failure talking to a provider
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered 429; carries the `Retry-After` seconds when sent
    #[error("Rate limited by provider{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// Provider answered with another non-success status
    #[error("API error: {code} - {message}")]
    Api { code: i32, message: String },

    /// Scholar served its bot check instead of results
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// Malformed provider payload or scraped page
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unusable setup: HTTP client, proxy, paths
    #[error("Config error: {0}")]
    Config(String),

    /// Out-of-range run parameters
    #[error("Validation error: {0}")]
    Validation(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(", retry after {}s", secs))
        .unwrap_or_default()
}

impl CrawlerError {
    /// Rate limit error from a 429 response's headers.
    ///
    /// Only the delta-seconds form of `Retry-After` is understood; an HTTP
    /// date is treated as absent.
    pub fn rate_limited(headers: &HeaderMap) -> Self {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        CrawlerError::RateLimited { retry_after }
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;

/// `Option` to `Result` with a [`CrawlerError::Parse`] message
pub trait OptionExt<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| CrawlerError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limited_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        let err = CrawlerError::rate_limited(&headers);
        assert!(matches!(err, CrawlerError::RateLimited { retry_after: Some(30) }));
        assert_eq!(err.to_string(), "Rate limited by provider, retry after 30s");
    }

    #[test]
    fn test_rate_limited_without_usable_header() {
        let err = CrawlerError::rate_limited(&HeaderMap::new());
        assert_eq!(err.to_string(), "Rate limited by provider");

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert!(matches!(
            CrawlerError::rate_limited(&headers),
            CrawlerError::RateLimited { retry_after: None }
        ));
    }

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        assert!(matches!(missing.ok_or_parse("no id"), Err(CrawlerError::Parse(m)) if m == "no id"));
        assert_eq!(Some(3).ok_or_parse("no id").ok(), Some(3));
    }
}
