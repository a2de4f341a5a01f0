use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::RegistryConfig;

/// One bike as returned by the registry's search endpoints. Fields the
/// registry sometimes omits deserialize to `None`/empty and are validated
/// where they are actually needed.
#[derive(Debug, Clone, Deserialize)]
pub struct BikeRecord {
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub frame_colors: Vec<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub frame_model: Option<String>,
    #[serde(default)]
    pub stolen: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub large_img: Option<String>,
}

impl BikeRecord {
    /// First listed frame color, if the registry recorded a non-empty one.
    pub fn first_color(&self) -> Option<&str> {
        self.frame_colors
            .first()
            .map(String::as_str)
            .filter(|color| !color.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    bikes: Vec<BikeRecord>,
}

pub struct RegistryClient {
    client: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Exact-serial search.
    pub async fn search(&self, serial: &str) -> Result<Vec<BikeRecord>> {
        self.fetch("search", serial).await
    }

    /// Fuzzy search for serials a small edit distance away, used when the
    /// exact search comes back empty.
    pub async fn close_serials(&self, serial: &str) -> Result<Vec<BikeRecord>> {
        self.fetch("search/close_serials", serial).await
    }

    async fn fetch(&self, endpoint: &str, serial: &str) -> Result<Vec<BikeRecord>> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        );

        debug!("Registry lookup: {} serial={:?}", url, serial);

        let response = self
            .client
            .get(&url)
            .query(&[("serial", serial)])
            .send()
            .await
            .context("Failed to reach the registry")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Registry API error ({}): {}", status, body);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse registry response")?;

        Ok(parsed.bikes)
    }
}
