pub mod twitter;

use chrono::{DateTime, Utc};

/// Half-open range of character offsets covering one entity in a message.
/// Offsets count codepoints, matching how the platform reports entity indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A mention received from the platform
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct IncomingMessage {
    /// Platform-assigned message id
    pub id: u64,
    /// Full message text
    pub text: String,
    /// Platform-specific author id
    pub author_id: u64,
    /// Author screen name, without the leading '@'
    pub author_handle: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Spans of user mentions within `text`
    pub mentions: Vec<EntitySpan>,
    /// Spans of hashtags within `text`
    pub hashtags: Vec<EntitySpan>,
    /// True when the message is a repost of someone else's message
    pub is_repost: bool,
}

/// A reply ready to hand to the outbound channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub text: String,
    /// Id of the message being replied to
    pub in_reply_to: u64,
    /// Optional image attached alongside the text
    pub media_url: Option<String>,
}
