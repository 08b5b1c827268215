//! Messaging platform access
//!
//! The delivery ladder only sees the [`MessagingPlatform`] trait. The production
//! implementation is [`BotApiClient`], which talks to the Telegram Bot API; tests
//! plug in in-memory fakes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::classify::UpstreamFailure;
use crate::types::MediaItem;

mod client;

pub use client::BotApiClient;

/// Parse mode used for rich captions
pub const PARSE_MODE: &str = "MarkdownV2";

/// Where and how a send lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendTarget<'a> {
    /// Destination chat or channel
    pub chat_id: &'a str,
    /// Caption placed on the (first) item, empty for none
    pub caption: &'a str,
    /// Whether the caption is MarkdownV2
    pub rich: bool,
}

impl<'a> SendTarget<'a> {
    /// Same destination without a caption
    pub fn uncaptioned(&self) -> Self {
        Self {
            caption: "",
            ..*self
        }
    }

    /// Parse mode to send, if any
    pub fn parse_mode(&self) -> Option<&'static str> {
        (self.rich && !self.caption.is_empty()).then_some(PARSE_MODE)
    }
}

/// Trait for the platform that receives media
///
/// Every call returns the platform's `result` payload on success and the raw
/// failure otherwise; classification happens in the caller.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Send one item by handing the platform its URL
    async fn send_by_reference(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> Result<Value, UpstreamFailure>;

    /// Send 2..=10 items as one media group by URL
    async fn send_group_by_reference(
        &self,
        target: &SendTarget<'_>,
        items: &[MediaItem],
    ) -> Result<Value, UpstreamFailure>;

    /// Fetch the item and stream it to the platform as a multipart upload
    async fn reupload(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> Result<Value, UpstreamFailure>;
}

/// Envelope of every Bot API reply
#[derive(Debug, Clone, Deserialize)]
pub struct BotApiResponse {
    /// Whether the call succeeded
    pub ok: bool,
    /// Payload on success
    #[serde(default)]
    pub result: Option<Value>,
    /// Error description on failure
    #[serde(default)]
    pub description: Option<String>,
    /// Error code on failure
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Extra failure information
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra information attached to failed Bot API replies
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating a rate-limited call
    #[serde(default)]
    pub retry_after: Option<u64>,
}
