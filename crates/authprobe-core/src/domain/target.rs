//! Target configuration: the ordered candidate base URLs of one run.

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// Environment variable holding a comma-separated list of base URLs.
pub const BASE_URLS_ENV: &str = "AUTHPROBE_BASE_URLS";

/// Ordered candidate deployments, tried front to back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    pub base_urls: Vec<String>,
}

impl TargetConfig {
    /// Build and validate a target list. Trailing slashes are trimmed.
    pub fn new<I, S>(base_urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_urls: Vec<String> = base_urls
            .into_iter()
            .map(|u| u.into().trim().trim_end_matches('/').to_string())
            .collect();
        let target = Self { base_urls };
        target.validate()?;
        Ok(target)
    }

    /// Parse a comma-separated list such as `https://a.example, https://b.example`.
    pub fn parse_list(raw: &str) -> Result<Self> {
        Self::new(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Read the target list from `AUTHPROBE_BASE_URLS`.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(BASE_URLS_ENV)
            .map_err(|_| ProbeError::InvalidTarget(format!("{} is not set", BASE_URLS_ENV)))?;
        Self::parse_list(&raw)
    }

    /// A target list is usable when it is non-empty and every entry is an
    /// absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.base_urls.is_empty() {
            return Err(ProbeError::InvalidTarget(
                "at least one base URL is required".to_string(),
            ));
        }
        for url in &self.base_urls {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| ProbeError::InvalidTarget(format!("'{}': {}", url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ProbeError::InvalidTarget(format!(
                    "'{}': unsupported scheme '{}'",
                    url,
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.base_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_urls.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.base_urls.get(index).map(String::as_str)
    }
}
