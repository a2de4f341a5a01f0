use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::TwitterConfig;
use crate::platform::{EntitySpan, IncomingMessage, OutboundReply};
use crate::watcher::Watcher;

/// A reply send that did not go through. Rate limiting is its own variant
/// so callers can drop the reply instead of retrying.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("reply rejected: rate limited")]
    RateLimited,
    #[error("platform API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TweetPayload {
    id: u64,
    #[serde(alias = "full_text")]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    user: UserPayload,
    #[serde(default)]
    entities: EntitiesPayload,
    #[serde(default)]
    retweeted_status: Option<Box<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: u64,
    screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct EntitiesPayload {
    #[serde(default)]
    user_mentions: Vec<EntityPayload>,
    #[serde(default)]
    hashtags: Vec<EntityPayload>,
}

#[derive(Debug, Deserialize)]
struct EntityPayload {
    indices: [usize; 2],
}

fn spans(entities: &[EntityPayload]) -> Vec<EntitySpan> {
    entities
        .iter()
        .map(|e| EntitySpan::new(e.indices[0], e.indices[1]))
        .collect()
}

// Timeline timestamps look like "Wed Oct 10 20:19:24 +0000 2018"
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl TweetPayload {
    fn into_message(self) -> IncomingMessage {
        IncomingMessage {
            id: self.id,
            author_id: self.user.id,
            author_handle: self.user.screen_name,
            created_at: self.created_at.as_deref().and_then(parse_created_at),
            mentions: spans(&self.entities.user_mentions),
            hashtags: spans(&self.entities.hashtags),
            is_repost: self.retweeted_status.is_some(),
            text: self.text,
        }
    }
}

pub struct TwitterClient {
    client: reqwest::Client,
    config: TwitterConfig,
}

impl TwitterClient {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Fetch every mention newer than `since_id`, walking the timeline page
    /// by page until an empty page comes back. Returned oldest-first.
    pub async fn mentions_since(&self, since_id: Option<u64>) -> Result<Vec<IncomingMessage>> {
        let mut collected: Vec<TweetPayload> = Vec::new();
        let mut max_id: Option<u64> = None;

        loop {
            let page = self.mentions_page(since_id, max_id).await?;
            let Some(oldest) = page.last() else { break };
            max_id = Some(oldest.id.saturating_sub(1));
            collected.extend(page);
        }

        debug!("Fetched {} mention(s)", collected.len());
        collected.reverse();
        Ok(collected
            .into_iter()
            .map(TweetPayload::into_message)
            .collect())
    }

    async fn mentions_page(
        &self,
        since_id: Option<u64>,
        max_id: Option<u64>,
    ) -> Result<Vec<TweetPayload>> {
        let mut query: Vec<(&str, String)> = vec![
            ("count", self.config.page_size.to_string()),
            ("tweet_mode", "extended".to_string()),
        ];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }
        if let Some(id) = max_id {
            query.push(("max_id", id.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint("statuses/mentions_timeline.json"))
            .bearer_auth(&self.config.bearer_token)
            .query(&query)
            .send()
            .await
            .context("Failed to fetch the mentions timeline")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mentions timeline error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse the mentions timeline")
    }

    /// Post one reply in the requester's thread.
    pub async fn post_reply(&self, reply: &OutboundReply) -> Result<(), SendError> {
        let mut form: Vec<(&str, String)> = vec![
            ("status", reply.text.clone()),
            ("in_reply_to_status_id", reply.in_reply_to.to_string()),
        ];
        if let Some(media) = &reply.media_url {
            form.push(("attachment_url", media.clone()));
        }

        let response = self
            .client
            .post(self.endpoint("statuses/update.json"))
            .bearer_auth(&self.config.bearer_token)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        // 420 is the platform's legacy rate-limit status, 429 the standard one
        if status.as_u16() == 420 || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SendError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Api { status, body });
        }

        Ok(())
    }
}

/// Poll the mentions timeline and answer each new mention in turn. One
/// mention is processed to completion, replies included, before the next.
pub async fn run(client: TwitterClient, watcher: Arc<Watcher>, poll_interval: Duration) -> Result<()> {
    info!("Watching mentions every {:?}...", poll_interval);
    let mut since_id: Option<u64> = None;

    loop {
        match client.mentions_since(since_id).await {
            Ok(mentions) => {
                for message in &mentions {
                    // Advance the watermark first: a mention that fails is
                    // skipped, never retried.
                    since_id = Some(since_id.unwrap_or(0).max(message.id));
                    handle_mention(&client, &watcher, message).await;
                }
            }
            Err(e) => error!("Failed to fetch mentions: {:#}", e),
        }

        tokio::time::sleep(poll_interval).await;
    }
}

async fn handle_mention(client: &TwitterClient, watcher: &Watcher, message: &IncomingMessage) {
    let replies = match watcher.process_message(message).await {
        Ok(replies) => replies,
        Err(e) => {
            error!("Skipping mention {}: {:#}", message.id, e);
            return;
        }
    };

    for reply in replies {
        match client.post_reply(&reply).await {
            Ok(()) => info!("Replied to {}: {}", message.id, reply.text),
            Err(SendError::RateLimited) => {
                warn!("Rate limited, dropping remaining replies to {}", message.id);
                return;
            }
            Err(e) => error!("Failed to send reply to {}: {}", message.id, e),
        }
    }
}
