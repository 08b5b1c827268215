//! Caption formatting
//!
//! Rich captions are rendered for Telegram MarkdownV2, so every user-supplied
//! fragment goes through [`escape_markdown_v2`] before it is placed in markup.
//! Tag-only captions are sent without a parse mode and need no escaping.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{CaptionPolicy, DeliveryRequest};

/// Platform limit on caption length
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Titles longer than this are cut
const MAX_TITLE_CHARS: usize = 256;

/// Authors longer than this are cut
const MAX_AUTHOR_CHARS: usize = 64;

/// Tag used when the source tag is not in [`SOURCE_TAGS`]
pub const UNKNOWN_TAG: &str = "#unknown";

/// Fixed source tag → display tag mapping for tag-only captions
const SOURCE_TAGS: &[(&str, &str)] = &[
    ("xhs", "#小红书"),
    ("xiaohongshu", "#小红书"),
    ("douyin", "#抖音"),
    ("weibo", "#微博"),
    ("bilibili", "#哔哩哔哩"),
    ("x", "#Twitter"),
    ("twitter", "#Twitter"),
    ("instagram", "#Instagram"),
];

/// Label texts used in rich captions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CaptionLabels {
    /// Placeholder when the title is empty
    #[serde(default = "default_untitled")]
    pub untitled: String,
    /// Label in front of the author
    #[serde(default = "default_author_label")]
    pub author: String,
    /// Label in front of the source link
    #[serde(default = "default_source_label")]
    pub source: String,
    /// Text of the source hyperlink
    #[serde(default = "default_link_text")]
    pub link_text: String,
    /// Author shown when neither author nor source tag is known
    #[serde(default = "default_unknown_author")]
    pub unknown_author: String,
}

impl Default for CaptionLabels {
    fn default() -> Self {
        Self {
            untitled: default_untitled(),
            author: default_author_label(),
            source: default_source_label(),
            link_text: default_link_text(),
            unknown_author: default_unknown_author(),
        }
    }
}

/// Build the caption a destination with `policy` places on its first item
pub fn format_caption(
    request: &DeliveryRequest,
    policy: CaptionPolicy,
    labels: &CaptionLabels,
) -> String {
    match policy {
        CaptionPolicy::RichLinked => rich_caption(request, labels),
        CaptionPolicy::TagOnly => display_tag(&request.source_tag).to_string(),
        CaptionPolicy::None => String::new(),
    }
}

/// Display tag for a source tag (case-insensitive, surrounding whitespace ignored)
pub fn display_tag(source_tag: &str) -> &'static str {
    let tag = source_tag.trim();
    SOURCE_TAGS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(tag))
        .map(|(_, display)| *display)
        .unwrap_or(UNKNOWN_TAG)
}

fn rich_caption(request: &DeliveryRequest, labels: &CaptionLabels) -> String {
    let title = request.title.trim();
    let title = if title.is_empty() {
        labels.untitled.clone()
    } else {
        truncate_chars(title, MAX_TITLE_CHARS)
    };

    let author = [request.author.trim(), request.source_tag.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or(labels.unknown_author.as_str());

    let mut caption = format!(
        "*{}*\n\n*{}:* {}",
        escape_markdown_v2(&title),
        escape_markdown_v2(&labels.author),
        escape_markdown_v2(&truncate_chars(author, MAX_AUTHOR_CHARS)),
    );

    if caption.chars().count() > MAX_CAPTION_CHARS {
        // Oversized labels: bold title alone, each char escapes to at most two
        let title = truncate_chars(&title, (MAX_CAPTION_CHARS - 2) / 2);
        return format!("*{}*", escape_markdown_v2(&title));
    }

    if let Some(link) = request
        .canonical_link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        let line = format!(
            "\n*{}:* [{}]({})",
            escape_markdown_v2(&labels.source),
            escape_markdown_v2(&labels.link_text),
            escape_link_url(link),
        );
        // The link line is all or nothing
        if caption.chars().count() + line.chars().count() <= MAX_CAPTION_CHARS {
            caption.push_str(&line);
        } else {
            tracing::debug!(
                link_chars = link.chars().count(),
                "Source link dropped from caption"
            );
        }
    }

    caption
}

/// Escape special characters for Telegram MarkdownV2.
///
/// MarkdownV2 requires escaping `_*[]()~>#+-=|{}.!`, the backtick and the backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
            | '|' | '{' | '}' | '.' | '!' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Inside the `(...)` part of an inline link only `)` and `\` are special
fn escape_link_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 4);
    for ch in url.chars() {
        if ch == ')' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn default_untitled() -> String {
    "无标题".to_string()
}

fn default_author_label() -> String {
    "作者".to_string()
}

fn default_source_label() -> String {
    "来源".to_string()
}

fn default_link_text() -> String {
    "点击查看".to_string()
}

fn default_unknown_author() -> String {
    "unknown".to_string()
}
