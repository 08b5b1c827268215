//! Core types for media-relay

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Kind of a remotely hosted media item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (default for anything that is not explicitly a video)
    #[default]
    Photo,
    /// Video clip
    Video,
}

impl MediaKind {
    /// Parse a client-supplied label; only `video` (any case) selects [`MediaKind::Video`]
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("video") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }

    /// Bot API method used to send a single item of this kind
    pub fn send_method(&self) -> &'static str {
        match self {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
        }
    }

    /// Field name carrying the media in Bot API requests (also the `type` in media groups)
    pub fn field(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// File name used for uploads when the source URL has none
    pub fn fallback_file_name(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo.jpg",
            MediaKind::Video => "video.mp4",
        }
    }
}

impl<'de> Deserialize<'de> for MediaKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(MediaKind::from_label(&label))
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

/// One media reference in a batch; its identity is its position in the batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaItem {
    /// Publicly reachable http(s) URL of the media (surrounding whitespace is
    /// stripped when deserialized)
    #[serde(deserialize_with = "trimmed_string")]
    pub url: String,
    /// Photo or video
    #[serde(default, alias = "type")]
    pub kind: MediaKind,
}

impl MediaItem {
    /// Create a photo item
    pub fn photo(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Photo,
        }
    }

    /// Create a video item
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
        }
    }
}

fn trimmed_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(match raw.trim() {
        trimmed if trimmed.len() == raw.len() => raw,
        trimmed => trimmed.to_string(),
    })
}

/// One inbound relay call: metadata plus the ordered media batch
///
/// Older clients send `noteUrl`, `files` and per-file `type`; those names are
/// accepted as aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    /// Post title
    #[serde(default)]
    pub title: String,
    /// Post author
    #[serde(default)]
    pub author: String,
    /// Short tag naming the source site (e.g. "xhs"); selects the routed destination
    #[serde(default, alias = "source")]
    pub source_tag: String,
    /// Link back to the original post
    #[serde(default, alias = "noteUrl")]
    pub canonical_link: Option<String>,
    /// Ordered media batch
    #[serde(default, alias = "files")]
    pub items: Vec<MediaItem>,
}

impl DeliveryRequest {
    /// Reject empty batches and references that are not absolute http(s) URLs
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::Validation("No files to process.".to_string()));
        }

        for (position, item) in self.items.iter().enumerate() {
            if item.url.trim() != item.url {
                return Err(Error::Validation(format!(
                    "item {position} has whitespace around its url"
                )));
            }
            let parsed = url::Url::parse(&item.url).map_err(|e| {
                Error::Validation(format!("item {position} has an invalid url: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Validation(format!(
                    "item {position} uses unsupported scheme '{}'",
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }
}

/// How a destination captions the first item of its first group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CaptionPolicy {
    /// Bold title, author line and source link, rendered as MarkdownV2
    #[default]
    RichLinked,
    /// A short plain-text tag derived from the source tag
    TagOnly,
    /// No caption at all
    None,
}

impl CaptionPolicy {
    /// Whether captions under this policy must be sent with a rich parse mode
    pub fn uses_rich_formatting(&self) -> bool {
        matches!(self, CaptionPolicy::RichLinked)
    }
}

/// A target channel together with its caption policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Channel identifier (`@name` or numeric id)
    pub channel: String,
    /// Caption policy for this channel
    pub caption_policy: CaptionPolicy,
}

impl Destination {
    /// Create a destination
    pub fn new(channel: impl Into<String>, caption_policy: CaptionPolicy) -> Self {
        Self {
            channel: channel.into(),
            caption_policy,
        }
    }
}

/// Delivery strategy, in escalating order of cost
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    /// The platform fetches the media from its URL
    ByReference,
    /// The service downloads the media and uploads it as an attachment
    StreamedReupload,
    /// The external large-file relay takes over
    ExternalRelay,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::ByReference => "byReference",
            Tier::StreamedReupload => "streamedReupload",
            Tier::ExternalRelay => "externalRelay",
        };
        f.write_str(name)
    }
}

/// Why an item or group ended up undelivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The platform refused the payload as too large
    UpstreamOversize,
    /// The platform or source refused the item for another reason
    UpstreamRejection,
    /// A transient failure persisted through every retry
    TransientExhausted,
    /// The external relay declined or could not be reached
    RelayFailure,
}

/// Terminal error recorded on a failed outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    /// Failure category
    pub kind: FailureKind,
    /// Tier that produced the last error
    pub tier: Tier,
    /// Human-readable description of the last error
    pub message: String,
    /// HTTP or platform status code, when one was returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Result of delivering one group (or one item of a decomposed group) to one destination
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    /// Index of the group within the batch
    pub group: usize,
    /// Batch positions covered by this outcome, in order
    pub items: Vec<usize>,
    /// Tier that delivered the media (absent on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_used: Option<Tier>,
    /// Every tier tried, in order
    pub tiers_attempted: Vec<Tier>,
    /// Network calls made across all tiers, retries included
    pub attempts: u32,
    /// Whether the media reached the destination
    pub success: bool,
    /// Platform or relay reply on success
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<serde_json::Value>,
    /// Last error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

/// All outcomes for one destination, in group then item order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationReport {
    /// Channel identifier
    pub channel: String,
    /// Caption policy used
    pub caption_policy: CaptionPolicy,
    /// Caption placed on the first item of the first group
    pub caption: String,
    /// Outcomes
    pub outcomes: Vec<DeliveryOutcome>,
}

/// Aggregate result of one relay call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Per-destination outcomes, in configuration order
    pub destinations: Vec<DestinationReport>,
    /// Item/destination pairs delivered
    pub delivered: usize,
    /// Item/destination pairs that failed
    pub failed: usize,
}

impl DeliveryReport {
    /// Build a report, counting delivered and failed item/destination pairs
    pub fn new(destinations: Vec<DestinationReport>) -> Self {
        let (delivered, failed) = destinations
            .iter()
            .flat_map(|d| d.outcomes.iter())
            .fold((0, 0), |(ok, failed), outcome| {
                if outcome.success {
                    (ok + outcome.items.len(), failed)
                } else {
                    (ok, failed + outcome.items.len())
                }
            });

        Self {
            destinations,
            delivered,
            failed,
        }
    }

    /// True when every item reached every destination
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    /// Outcomes for one channel
    pub fn for_channel(&self, channel: &str) -> Option<&DestinationReport> {
        self.destinations.iter().find(|d| d.channel == channel)
    }
}
