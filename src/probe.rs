//! Size probing ahead of delivery
//!
//! A probe only ever routes an item straight to the relay, so its answer is a
//! hint: any failure or missing header degrades to [`SizeHint::Unknown`] and the
//! item starts at the by-reference tier as usual.

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{FailureClassifier, FailureOrigin, UpstreamFailure};
use crate::config::{DeliveryConfig, RetryConfig};
use crate::error::{DeliveryError, Result};
use crate::retry::with_retry;
use crate::types::MediaItem;

/// Probes in flight at once for one batch
const PROBE_CONCURRENCY: usize = 4;

/// Result of probing one item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SizeHint {
    /// Size reported by the media server
    Known(u64),
    /// No usable answer
    #[default]
    Unknown,
}

impl SizeHint {
    /// True only when the size is known and strictly above `threshold`
    pub fn exceeds(&self, threshold: u64) -> bool {
        matches!(self, SizeHint::Known(bytes) if *bytes > threshold)
    }
}

/// Determines media sizes with `HEAD`, falling back to a one-byte ranged `GET`
pub struct SizeProber {
    client: reqwest::Client,
    retry: RetryConfig,
    deadline: Duration,
    classifier: Arc<dyn FailureClassifier>,
}

impl SizeProber {
    /// Create a prober bounded by `delivery.probe_timeout`
    ///
    /// Probes are retried at most once regardless of the delivery retry budget.
    pub fn new(
        delivery: &DeliveryConfig,
        retry: &RetryConfig,
        classifier: Arc<dyn FailureClassifier>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(delivery.probe_timeout)
            .build()?;

        Ok(Self {
            client,
            retry: retry.with_max_attempts(retry.max_attempts.min(2)),
            deadline: delivery.probe_timeout,
            classifier,
        })
    }

    /// Probe one URL
    pub async fn probe(&self, url: &str) -> SizeHint {
        let probed = tokio::time::timeout(
            self.deadline,
            with_retry(&self.retry, || self.probe_once(url)),
        )
        .await;

        match probed {
            Ok(Ok(Some(bytes))) => {
                tracing::debug!(url = %url, bytes, "Probed media size");
                SizeHint::Known(bytes)
            }
            Ok(Ok(None)) => {
                tracing::debug!(url = %url, "Media server did not report a size");
                SizeHint::Unknown
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "Size probe failed");
                SizeHint::Unknown
            }
            Err(_) => {
                tracing::debug!(url = %url, "Size probe timed out");
                SizeHint::Unknown
            }
        }
    }

    /// Probe every item of a batch, returning hints in batch order
    pub async fn probe_all(&self, items: &[MediaItem]) -> Vec<SizeHint> {
        let probes: Vec<_> = items.iter().map(|item| self.probe(&item.url)).collect();
        futures::stream::iter(probes)
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await
    }

    async fn probe_once(&self, url: &str) -> std::result::Result<Option<u64>, DeliveryError> {
        if let Ok(response) = self.client.head(url).send().await {
            if response.status().is_success() {
                if let Some(bytes) = header_u64(response.headers(), CONTENT_LENGTH) {
                    if bytes > 0 {
                        return Ok(Some(bytes));
                    }
                }
            }
        }

        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| self.failure(UpstreamFailure::from_reqwest(FailureOrigin::Source, &e)))?;

        let status = response.status();
        if status == StatusCode::PARTIAL_CONTENT {
            return Ok(response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(total_from_content_range));
        }
        if status.is_success() {
            // Range ignored; the full-body length is still the size. The body is
            // dropped unread.
            return Ok(header_u64(response.headers(), CONTENT_LENGTH).filter(|b| *b > 0));
        }

        Err(self.failure(UpstreamFailure::http(
            FailureOrigin::Source,
            status.as_u16(),
            status.canonical_reason().unwrap_or("probe failed"),
        )))
    }

    fn failure(&self, failure: UpstreamFailure) -> DeliveryError {
        DeliveryError::Upstream {
            class: self.classifier.classify(&failure),
            failure,
        }
    }
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Total length from a `Content-Range: bytes 0-0/12345` header (`*` is unknown)
fn total_from_content_range(value: &str) -> Option<u64> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
}
