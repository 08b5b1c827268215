//! One attempt at one tier
//!
//! Each tier call runs under the retry controller. The attempt records how many
//! network calls it made and the final result; classification of platform
//! failures happens here so the ladder only ever sees a [`FailureClass`].
//!
//! [`FailureClass`]: crate::classify::FailureClass

use serde_json::Value;

use crate::classify::{FailureClassifier, UpstreamFailure};
use crate::config::RetryConfig;
use crate::error::DeliveryError;
use crate::relay::{LargeFileRelay, RelayJob};
use crate::retry::with_retry;
use crate::telegram::{MessagingPlatform, SendTarget};
use crate::types::{MediaItem, Tier};

/// Outcome of one tier for one item or group
#[derive(Debug)]
pub struct TierAttempt {
    /// Tier that was tried
    pub tier: Tier,
    /// Network calls made, retries included
    pub attempt_count: u32,
    /// Payload on success, last error otherwise
    pub result: Result<Value, DeliveryError>,
}

impl TierAttempt {
    /// Last error, if the tier failed
    pub fn last_error(&self) -> Option<&DeliveryError> {
        self.result.as_ref().err()
    }
}

/// The collaborators every tier needs, borrowed for one request
#[derive(Clone, Copy)]
pub struct Tiers<'a> {
    /// Messaging platform
    pub platform: &'a dyn MessagingPlatform,
    /// Relay, when configured
    pub relay: Option<&'a dyn LargeFileRelay>,
    /// Classifier for platform and source failures
    pub classifier: &'a dyn FailureClassifier,
    /// Retry policy for every call
    pub retry: &'a RetryConfig,
}

impl<'a> Tiers<'a> {
    /// Whether the relay tier is available
    pub fn relay_configured(&self) -> bool {
        self.relay.is_some()
    }

    /// Try one item at `tier`
    pub async fn attempt(&self, tier: Tier, target: &SendTarget<'_>, item: &MediaItem) -> TierAttempt {
        let mut attempt_count = 0u32;
        let platform = self.platform;
        let classifier = self.classifier;

        let result = match tier {
            Tier::ByReference => {
                with_retry(self.retry, || {
                    attempt_count += 1;
                    async move {
                        platform
                            .send_by_reference(target, item)
                            .await
                            .map_err(|f| classified(classifier, f))
                    }
                })
                .await
            }
            Tier::StreamedReupload => {
                with_retry(self.retry, || {
                    attempt_count += 1;
                    async move {
                        platform
                            .reupload(target, item)
                            .await
                            .map_err(|f| classified(classifier, f))
                    }
                })
                .await
            }
            Tier::ExternalRelay => match self.relay {
                Some(relay) => {
                    let job = RelayJob {
                        destination_channel: target.chat_id.to_string(),
                        file_url: item.url.clone(),
                        caption: target.caption.to_string(),
                        use_rich_formatting: target.parse_mode().is_some(),
                        kind: item.kind,
                    };
                    let job = &job;
                    with_retry(self.retry, || {
                        attempt_count += 1;
                        async move { relay.delegate(job).await }
                    })
                    .await
                }
                None => Err(DeliveryError::RelayDeclined(
                    "no relay is configured".to_string(),
                )),
            },
        };

        log_attempt(tier, target, attempt_count, &result);
        TierAttempt {
            tier,
            attempt_count,
            result,
        }
    }

    /// Try a whole group as one media group by reference
    pub async fn attempt_group(&self, target: &SendTarget<'_>, items: &[MediaItem]) -> TierAttempt {
        let mut attempt_count = 0u32;
        let platform = self.platform;
        let classifier = self.classifier;

        let result = with_retry(self.retry, || {
            attempt_count += 1;
            async move {
                platform
                    .send_group_by_reference(target, items)
                    .await
                    .map_err(|f| classified(classifier, f))
            }
        })
        .await;

        log_attempt(Tier::ByReference, target, attempt_count, &result);
        TierAttempt {
            tier: Tier::ByReference,
            attempt_count,
            result,
        }
    }
}

fn classified(classifier: &dyn FailureClassifier, failure: UpstreamFailure) -> DeliveryError {
    DeliveryError::Upstream {
        class: classifier.classify(&failure),
        failure,
    }
}

fn log_attempt(
    tier: Tier,
    target: &SendTarget<'_>,
    attempts: u32,
    result: &Result<Value, DeliveryError>,
) {
    match result {
        Ok(_) => tracing::debug!(channel = %target.chat_id, %tier, attempts, "Tier delivered"),
        Err(e) => tracing::debug!(
            channel = %target.chat_id,
            %tier,
            attempts,
            class = %e.class(),
            error = %e,
            "Tier failed"
        ),
    }
}
