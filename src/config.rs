//! Configuration types for media-relay
//!
//! [`Config`] is loaded once at startup (see [`Config::from_env`]) and shared
//! read-only behind an `Arc` for the life of the process.

use crate::caption::CaptionLabels;
use crate::classify::OversizeDetection;
use crate::error::{Error, Result};
use crate::types::{CaptionPolicy, Destination};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

/// Environment variable holding the bot credential
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the main destination
pub const ENV_MAIN_CHANNEL: &str = "TELEGRAM_CHANNEL_ID";
/// Prefix of per-source routed destination variables (`TELEGRAM_CHANNEL_XHS`, ...)
pub const ENV_ROUTED_CHANNEL_PREFIX: &str = "TELEGRAM_CHANNEL_";

/// Messaging platform (Telegram Bot API) settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TelegramConfig {
    /// Bot credential; required to deliver anything
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout for JSON Bot API calls (default: 30 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub api_timeout: Duration,

    /// Timeout for a whole download-and-upload transfer (default: 300 seconds)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub transfer_timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            api_timeout: default_api_timeout(),
            transfer_timeout: default_transfer_timeout(),
        }
    }
}

/// Where relayed media goes
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DestinationsConfig {
    /// Main channel; required to deliver anything
    #[serde(default)]
    pub main_channel: Option<String>,

    /// Caption policy of the main channel (default: richLinked)
    #[serde(default)]
    pub main_caption: CaptionPolicy,

    /// Routed channels keyed by lower-case source tag
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    /// Caption policy of routed channels (default: tagOnly)
    #[serde(default = "default_routed_caption")]
    pub routed_caption: CaptionPolicy,
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            main_channel: None,
            main_caption: CaptionPolicy::RichLinked,
            routes: BTreeMap::new(),
            routed_caption: default_routed_caption(),
        }
    }
}

/// Tier selection settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryConfig {
    /// Size above which a probed item goes straight to the relay (default: 50 MiB,
    /// the Bot API upload ceiling)
    #[serde(default = "default_oversize_threshold")]
    pub oversize_threshold_bytes: u64,

    /// Probe item sizes before delivery when a relay is configured (default: true)
    #[serde(default = "default_true")]
    pub size_probe: bool,

    /// Upper bound on one item's size probe, retry included (default: 15 seconds)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub probe_timeout: Duration,

    /// How oversize rejections are recognised
    #[serde(default)]
    pub oversize_detection: OversizeDetection,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            oversize_threshold_bytes: default_oversize_threshold(),
            size_probe: true,
            probe_timeout: default_probe_timeout(),
            oversize_detection: OversizeDetection::default(),
        }
    }
}

/// External large-file relay
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayConfig {
    /// Endpoint receiving delegation POSTs
    pub endpoint: String,

    /// Optional Authorization header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for one delegation call (default: 300 seconds)
    #[serde(default = "default_relay_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,
}

impl RelayConfig {
    /// Relay at `endpoint` with default settings
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_header: None,
            timeout: default_relay_timeout(),
        }
    }
}

/// Retry configuration for network calls
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Same backoff with a different attempt budget
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["https://www.xiaohongshu.com"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for media-relay
///
/// Fields are organized into logical sub-configs:
/// - [`telegram`](TelegramConfig) - bot credential, API endpoint, timeouts
/// - [`destinations`](DestinationsConfig) - main and routed channels
/// - [`caption`](CaptionLabels) - caption label texts
/// - [`delivery`](DeliveryConfig) - size probing and oversize detection
/// - [`relay`](RelayConfig) - optional external large-file relay
/// - [`retry`](RetryConfig) - backoff for every network call
/// - [`server`](ServerIntegrationConfig) - HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Messaging platform settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Destination channels
    #[serde(default)]
    pub destinations: DestinationsConfig,

    /// Caption label texts
    #[serde(default)]
    pub caption: CaptionLabels,

    /// Tier selection settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// External relay (None = no relay tier)
    #[serde(default)]
    pub relay: Option<RelayConfig>,

    /// Retry behaviour
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from explicit key/value pairs
    ///
    /// Unset variables keep their defaults. Numeric or boolean values that fail to
    /// parse are reported as [`Error::Config`] naming the variable.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        let mut config = Config::default();

        config.telegram.bot_token = get(ENV_BOT_TOKEN);
        if let Some(base) = get("TELEGRAM_API_BASE") {
            config.telegram.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&vars, "TELEGRAM_API_TIMEOUT_SECS")? {
            config.telegram.api_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&vars, "TELEGRAM_TRANSFER_TIMEOUT_SECS")? {
            config.telegram.transfer_timeout = Duration::from_secs(secs);
        }

        config.destinations.main_channel = get(ENV_MAIN_CHANNEL);
        for (key, channel) in &vars {
            if key == ENV_MAIN_CHANNEL {
                continue;
            }
            if let Some(tag) = key.strip_prefix(ENV_ROUTED_CHANNEL_PREFIX) {
                if !tag.is_empty() {
                    config
                        .destinations
                        .routes
                        .insert(tag.to_ascii_lowercase(), channel.trim().to_string());
                }
            }
        }

        if let Some(bytes) = parse_var::<u64>(&vars, "OVERSIZE_THRESHOLD_BYTES")? {
            config.delivery.oversize_threshold_bytes = bytes;
        }
        if let Some(enabled) = parse_var::<bool>(&vars, "SIZE_PROBE")? {
            config.delivery.size_probe = enabled;
        }
        if let Some(detection) = parse_var::<OversizeDetection>(&vars, "OVERSIZE_DETECTION")? {
            config.delivery.oversize_detection = detection;
        }

        if let Some(endpoint) = get("RELAY_URL") {
            let mut relay = RelayConfig::new(endpoint);
            relay.auth_header = get("RELAY_AUTH_HEADER");
            if let Some(secs) = parse_var::<u64>(&vars, "RELAY_TIMEOUT_SECS")? {
                relay.timeout = Duration::from_secs(secs);
            }
            config.relay = Some(relay);
        }

        if let Some(attempts) = parse_var::<u32>(&vars, "RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts.max(1);
        }

        if let Some(address) = parse_var::<SocketAddr>(&vars, "BIND_ADDRESS")? {
            config.server.api.bind_address = address;
        } else if let Some(port) = parse_var::<u16>(&vars, "PORT")? {
            config.server.api.bind_address = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            config.server.api.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        config.server.api.api_key = get("API_KEY");

        Ok(config)
    }

    /// Bot credential, or a configuration error when it is missing
    pub fn bot_token(&self) -> Result<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::config(ENV_BOT_TOKEN, "bot token is not configured"))
    }

    /// Destinations for a request with the given source tag
    ///
    /// The main destination always comes first; a routed destination follows when
    /// the tag has one.
    pub fn destinations_for(&self, source_tag: &str) -> Result<Vec<Destination>> {
        let main = self
            .destinations
            .main_channel
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::config(ENV_MAIN_CHANNEL, "main destination is not configured"))?;

        let mut destinations = vec![Destination::new(main, self.destinations.main_caption)];

        let tag = source_tag.trim().to_ascii_lowercase();
        if let Some(channel) = self.destinations.routes.get(&tag) {
            destinations.push(Destination::new(
                channel.clone(),
                self.destinations.routed_caption,
            ));
        }

        Ok(destinations)
    }

    /// Check the settings every delivery needs
    pub fn check_required(&self) -> Result<()> {
        self.bot_token()?;
        self.destinations_for("")?;
        Ok(())
    }

    /// Whether the relay tier is available
    pub fn relay_configured(&self) -> bool {
        self.relay.is_some()
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(key, format!("invalid value '{raw}' for {key}: {e}"))),
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_routed_caption() -> CaptionPolicy {
    CaptionPolicy::TagOnly
}

fn default_oversize_threshold() -> u64 {
    50 * 1024 * 1024
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_relay_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["https://www.xiaohongshu.com".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
