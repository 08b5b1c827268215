//! Failure classification
//!
//! Collaborator calls report failures as a raw [`UpstreamFailure`] (status,
//! description, transport fault). A [`FailureClassifier`] turns that shape into
//! a closed [`FailureClass`] which alone drives retries and tier escalation.
//!
//! The default [`StatusCodeClassifier`] only trusts status codes. The Bot API does
//! not document a stable "too large" signal for by-reference sends, so matching on
//! the free-text description is opt-in via [`DescriptionHeuristicClassifier`] and
//! is best-effort.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Which collaborator produced a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The messaging platform (Bot API)
    Platform,
    /// The server hosting the media
    Source,
    /// The external large-file relay
    Relay,
}

impl std::fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureOrigin::Platform => "platform",
            FailureOrigin::Source => "source",
            FailureOrigin::Relay => "relay",
        };
        f.write_str(name)
    }
}

/// Failure that happened below HTTP (no status code available)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFault {
    /// The call exceeded its timeout
    Timeout,
    /// The connection could not be established
    Connect,
    /// The connection broke while sending or receiving
    Interrupted,
    /// A reply arrived but could not be decoded
    Decode,
}

/// Raw failure as reported by a collaborator call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// Collaborator that failed
    pub origin: FailureOrigin,
    /// HTTP status or platform `error_code`
    pub status: Option<u16>,
    /// Description from the reply body or the transport error
    pub description: String,
    /// Delay the collaborator asked for before trying again
    pub retry_after: Option<Duration>,
    /// Set when no HTTP reply was obtained
    pub transport: Option<TransportFault>,
}

impl UpstreamFailure {
    /// Failure carried by an HTTP reply
    pub fn http(origin: FailureOrigin, status: u16, description: impl Into<String>) -> Self {
        Self {
            origin,
            status: Some(status),
            description: description.into(),
            retry_after: None,
            transport: None,
        }
    }

    /// Failure without an HTTP reply
    pub fn transport(
        origin: FailureOrigin,
        fault: TransportFault,
        description: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            status: None,
            description: description.into(),
            retry_after: None,
            transport: Some(fault),
        }
    }

    /// Translate a reqwest error, keeping any status it carries
    pub fn from_reqwest(origin: FailureOrigin, error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::http(origin, status.as_u16(), error.to_string());
        }

        let fault = if error.is_timeout() {
            TransportFault::Timeout
        } else if error.is_connect() {
            TransportFault::Connect
        } else if error.is_decode() {
            TransportFault::Decode
        } else {
            TransportFault::Interrupted
        };
        Self::transport(origin, fault, error.to_string())
    }

    /// Attach a retry hint
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.transport) {
            (Some(status), _) => write!(f, "{} {}: {}", self.origin, status, self.description),
            (None, Some(fault)) => {
                write!(f, "{} {:?}: {}", self.origin, fault, self.description)
            }
            (None, None) => write!(f, "{}: {}", self.origin, self.description),
        }
    }
}

/// Closed set of failure classes the pipeline reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Payload exceeds a platform limit; escalate to the relay when possible
    Oversize,
    /// Worth retrying (rate limit, upstream unavailable, timeout)
    Transient,
    /// Any other refusal
    Rejected,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureClass::Oversize => "oversize rejection",
            FailureClass::Transient => "transient failure",
            FailureClass::Rejected => "upstream rejection",
        };
        f.write_str(name)
    }
}

/// Maps a raw collaborator failure onto a [`FailureClass`]
pub trait FailureClassifier: Send + Sync {
    /// Classify a failure
    fn classify(&self, failure: &UpstreamFailure) -> FailureClass;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Status-code based classification (the conservative default)
///
/// - 413 → [`FailureClass::Oversize`]
/// - 408, 429, 5xx, timeouts, connection failures, interrupted transfers →
///   [`FailureClass::Transient`]
/// - everything else (other 4xx, undecodable replies) → [`FailureClass::Rejected`]
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusCodeClassifier;

impl FailureClassifier for StatusCodeClassifier {
    fn classify(&self, failure: &UpstreamFailure) -> FailureClass {
        if let Some(status) = failure.status {
            return match status {
                413 => FailureClass::Oversize,
                408 | 429 => FailureClass::Transient,
                500..=599 => FailureClass::Transient,
                _ => FailureClass::Rejected,
            };
        }

        match failure.transport {
            Some(TransportFault::Timeout | TransportFault::Connect | TransportFault::Interrupted) => {
                FailureClass::Transient
            }
            Some(TransportFault::Decode) | None => FailureClass::Rejected,
        }
    }

    fn name(&self) -> &str {
        "status-code"
    }
}

const OVERSIZE_DESCRIPTION_PATTERNS: &[&str] = &[
    r"(?i)\btoo\s+(large|big)\b",
    r"(?i)entity\s+too\s+large",
    r"(?i)file\s+is\s+too\s+big",
    r"(?i)file\s+size\s+exceeds",
];

/// Status codes first, then a best-effort match on the description
///
/// Only platform failures with a non-transient class are re-examined, so a rate
/// limit whose text happens to mention size still gets retried.
#[derive(Debug)]
pub struct DescriptionHeuristicClassifier {
    patterns: RegexSet,
}

impl DescriptionHeuristicClassifier {
    /// Build the classifier with the built-in "too large" patterns
    pub fn new() -> Result<Self> {
        let patterns = RegexSet::new(OVERSIZE_DESCRIPTION_PATTERNS)
            .map_err(|e| Error::Other(format!("invalid oversize pattern: {e}")))?;
        Ok(Self { patterns })
    }
}

impl FailureClassifier for DescriptionHeuristicClassifier {
    fn classify(&self, failure: &UpstreamFailure) -> FailureClass {
        let by_status = StatusCodeClassifier.classify(failure);
        if by_status == FailureClass::Rejected
            && failure.origin == FailureOrigin::Platform
            && self.patterns.is_match(&failure.description)
        {
            return FailureClass::Oversize;
        }
        by_status
    }

    fn name(&self) -> &str {
        "status-code+description"
    }
}

/// Signal used to recognise oversize rejections
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OversizeDetection {
    /// HTTP/platform status 413 only
    #[default]
    StatusCode,
    /// Status 413, or a platform description that reads like a size refusal
    StatusCodeAndDescription,
}

impl OversizeDetection {
    /// Build the classifier for this detection mode
    pub fn classifier(&self) -> Result<std::sync::Arc<dyn FailureClassifier>> {
        Ok(match self {
            OversizeDetection::StatusCode => std::sync::Arc::new(StatusCodeClassifier),
            OversizeDetection::StatusCodeAndDescription => {
                std::sync::Arc::new(DescriptionHeuristicClassifier::new()?)
            }
        })
    }
}

impl std::str::FromStr for OversizeDetection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status_code" | "status" => Ok(OversizeDetection::StatusCode),
            "status_code_and_description" | "description" => {
                Ok(OversizeDetection::StatusCodeAndDescription)
            }
            other => Err(format!("unknown oversize detection mode '{other}'")),
        }
    }
}
