//! Telegram Bot API client

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value, json};
use std::time::Duration;

use super::{BotApiResponse, MessagingPlatform, SendTarget};
use crate::classify::{FailureOrigin, UpstreamFailure};
use crate::config::TelegramConfig;
use crate::error::Result;
use crate::types::{MediaItem, MediaKind};

/// [`MessagingPlatform`] backed by the Telegram Bot API
///
/// JSON calls use a client bounded by `api_timeout`; multipart uploads and the
/// source downloads feeding them use a separate client bounded by
/// `transfer_timeout`. Neither the token nor the full method URL is ever logged.
#[derive(Clone)]
pub struct BotApiClient {
    api: reqwest::Client,
    transfer: reqwest::Client,
    base: String,
}

impl std::fmt::Debug for BotApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApiClient").finish_non_exhaustive()
    }
}

impl BotApiClient {
    /// Create a client for the bot identified by `token`
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self> {
        let api = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()?;
        let transfer = reqwest::Client::builder()
            .timeout(config.transfer_timeout)
            .build()?;

        Ok(Self {
            api,
            transfer,
            base: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    /// Send a request and unwrap the Bot API envelope
    async fn dispatch(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<Value, UpstreamFailure> {
        tracing::debug!(method, "Calling Bot API");

        let response = request
            .send()
            .await
            .map_err(|e| platform_transport(method, e))?;
        let status = response.status();

        let reply: BotApiResponse = match response.json().await {
            Ok(reply) => reply,
            Err(e) if status.is_success() => return Err(platform_transport(method, e)),
            Err(_) => {
                return Err(UpstreamFailure::http(
                    FailureOrigin::Platform,
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Bot API error"),
                ));
            }
        };

        if reply.ok {
            return Ok(reply.result.unwrap_or(Value::Null));
        }

        let code = reply
            .error_code
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or_else(|| status.as_u16());
        let retry_after = reply
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs);
        let description = reply
            .description
            .unwrap_or_else(|| format!("{method} failed"));

        tracing::debug!(method, code, description = %description, "Bot API refused call");
        Err(UpstreamFailure::http(FailureOrigin::Platform, code, description)
            .with_retry_after(retry_after))
    }
}

#[async_trait]
impl MessagingPlatform for BotApiClient {
    async fn send_by_reference(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> std::result::Result<Value, UpstreamFailure> {
        let method = item.kind.send_method();

        let mut body = Map::new();
        body.insert("chat_id".into(), json!(target.chat_id));
        body.insert(item.kind.field().into(), json!(item.url));
        insert_caption(&mut body, target);
        if item.kind == MediaKind::Video {
            body.insert("supports_streaming".into(), json!(true));
        }

        let request = self.api.post(self.method_url(method)).json(&body);
        self.dispatch(method, request).await
    }

    async fn send_group_by_reference(
        &self,
        target: &SendTarget<'_>,
        items: &[MediaItem],
    ) -> std::result::Result<Value, UpstreamFailure> {
        let method = "sendMediaGroup";

        let media: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut entry = Map::new();
                entry.insert("type".into(), json!(item.kind.field()));
                entry.insert("media".into(), json!(item.url));
                if i == 0 {
                    insert_caption(&mut entry, target);
                }
                Value::Object(entry)
            })
            .collect();

        let body = json!({
            "chat_id": target.chat_id,
            "media": media,
        });

        let request = self.api.post(self.method_url(method)).json(&body);
        self.dispatch(method, request).await
    }

    async fn reupload(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> std::result::Result<Value, UpstreamFailure> {
        let method = item.kind.send_method();

        let source = self
            .transfer
            .get(&item.url)
            .send()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(FailureOrigin::Source, &e))?;

        let status = source.status();
        if !status.is_success() {
            return Err(UpstreamFailure::http(
                FailureOrigin::Source,
                status.as_u16(),
                status.canonical_reason().unwrap_or("media download failed"),
            ));
        }

        let length = source.content_length();
        tracing::debug!(method, bytes = ?length, "Streaming media to Bot API");

        let body = reqwest::Body::wrap_stream(source.bytes_stream());
        let part = match length {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        }
        .file_name(file_name(item));

        let mut form = Form::new()
            .text("chat_id", target.chat_id.to_string())
            .part(item.kind.field(), part);
        if !target.caption.is_empty() {
            form = form.text("caption", target.caption.to_string());
        }
        if let Some(mode) = target.parse_mode() {
            form = form.text("parse_mode", mode);
        }
        if item.kind == MediaKind::Video {
            form = form.text("supports_streaming", "true");
        }

        let request = self.transfer.post(self.method_url(method)).multipart(form);
        self.dispatch(method, request).await
    }
}

fn insert_caption(body: &mut Map<String, Value>, target: &SendTarget<'_>) {
    if target.caption.is_empty() {
        return;
    }
    body.insert("caption".into(), json!(target.caption));
    if let Some(mode) = target.parse_mode() {
        body.insert("parse_mode".into(), json!(mode));
    }
}

/// Last path segment of the media URL, or a kind-specific fallback
fn file_name(item: &MediaItem) -> String {
    url::Url::parse(&item.url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| item.kind.fallback_file_name().to_string())
}

/// Transport failure with the token-bearing URL stripped
fn platform_transport(method: &str, error: reqwest::Error) -> UpstreamFailure {
    let failure = UpstreamFailure::from_reqwest(FailureOrigin::Platform, &error.without_url());
    tracing::debug!(method, error = %failure, "Bot API call failed in transport");
    failure
}
