//! Session cookies for the Google Scholar fallback scraper.
//!
//! Scholar serves CAPTCHAs to cookie-less clients quickly. A cookie file
//! exported from a browser session keeps the scraper usable for longer.

use crate::error::{CrawlerError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Default cookie file path: `~/.scholar_crawler_cookies.json`
pub fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".scholar_crawler_cookies.json"))
        .ok_or_else(|| CrawlerError::Config("Cannot determine home directory".to_string()))
}

/// Cookie entry in browser-export format
#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expires: Option<f64>,
}

/// Browser-exported cookie file
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Jar at the default location, or `None` without a home directory
    pub fn at_default_path() -> Option<Self> {
        default_cookie_path().ok().map(Self::new)
    }

    /// Load cookies; a missing or invalid file yields none.
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!("Cookie file not found: {:?}", self.path);
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
                Ok(cookies) => {
                    info!("Loaded {} cookies from {:?}", cookies.len(), self.path);
                    cookies
                }
                Err(e) => {
                    warn!("Failed to parse cookies: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file: {}", e);
                Vec::new()
            }
        }
    }

    /// `Cookie` header value for Google domains.
    pub fn google_header(&self) -> String {
        cookie_header(&self.load())
    }
}

/// Build a `Cookie` header from the Google-domain entries.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.domain.contains("google"))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
