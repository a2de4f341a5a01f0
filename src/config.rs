use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    /// Bearer token for the platform API. May be left empty in the file and
    /// supplied via the TWITTER_BEARER_TOKEN environment variable instead.
    #[serde(default)]
    pub bearer_token: String,
    /// The bot's own screen name, without the leading '@'. Mentions authored
    /// by this account are never answered.
    pub handle: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Mentions fetched per timeline page during a backlog sweep.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
}

/// Character-budget constants for outbound replies. The platform rewrites
/// every link to a fixed-length short form and charges a fixed amount for an
/// attached media reference, so the composer budgets against these reserves
/// rather than the literal URL lengths.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplyConfig {
    #[serde(default = "default_total_limit")]
    pub total_limit: usize,
    #[serde(default = "default_link_reserve")]
    pub link_reserve: usize,
    #[serde(default = "default_media_reserve")]
    pub media_reserve: usize,
    /// Search-results page linked from the no-match and too-many-matches
    /// replies; the serial is appended as an encoded query parameter.
    #[serde(default = "default_search_url")]
    pub search_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_base_url(),
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            total_limit: default_total_limit(),
            link_reserve: default_link_reserve(),
            media_reserve: default_media_reserve(),
            search_url: default_search_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.twitter.com/1.1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_page_size() -> u32 {
    200
}

fn default_registry_base_url() -> String {
    "https://bikeindex.org/api/v3".to_string()
}

fn default_total_limit() -> usize {
    280
}

fn default_link_reserve() -> usize {
    23
}

fn default_media_reserve() -> usize {
    24
}

fn default_search_url() -> String {
    "https://bikeindex.org/bikes?stolenness=all".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.twitter.bearer_token.is_empty() {
            if let Ok(token) = std::env::var("TWITTER_BEARER_TOKEN") {
                config.twitter.bearer_token = token;
            }
        }
        if config.twitter.bearer_token.is_empty() {
            anyhow::bail!(
                "No bearer token: set [twitter] bearer_token in {} or TWITTER_BEARER_TOKEN",
                path.display()
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [twitter]
            bearer_token = "token"
            handle = "stolenwatch"
            "#,
        )
        .unwrap();

        assert_eq!(config.twitter.poll_interval_secs, 60);
        assert_eq!(config.twitter.page_size, 200);
        assert_eq!(config.registry.base_url, "https://bikeindex.org/api/v3");
        assert_eq!(config.reply.total_limit, 280);
        assert_eq!(config.reply.link_reserve, 23);
        assert_eq!(config.reply.media_reserve, 24);
    }

    #[test]
    fn test_reply_section_overrides() {
        let config: Config = toml::from_str(
            r#"
            [twitter]
            bearer_token = "token"
            handle = "stolenwatch"

            [reply]
            total_limit = 140
            link_reserve = 22
            "#,
        )
        .unwrap();

        assert_eq!(config.reply.total_limit, 140);
        assert_eq!(config.reply.link_reserve, 22);
        assert_eq!(config.reply.media_reserve, 24);
    }
}
