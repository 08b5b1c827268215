//! Batch delivery across destinations

use futures::future::join_all;
use std::sync::Arc;

use super::ladder::deliver_group;
use super::tiers::Tiers;
use crate::caption::format_caption;
use crate::classify::FailureClassifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::partition::{Group, MAX_GROUP_SIZE, partition};
use crate::probe::{SizeHint, SizeProber};
use crate::relay::{HttpRelayClient, LargeFileRelay};
use crate::telegram::{BotApiClient, MessagingPlatform, SendTarget};
use crate::types::{DeliveryReport, DeliveryRequest, Destination, DestinationReport};

/// Relays media batches into the configured destinations
///
/// Built once from an immutable [`Config`] and shared between requests. The
/// platform and relay are trait objects so tests (and embedders) can swap them.
///
/// # Example
///
/// ```no_run
/// use media_relay::{Config, MediaRelay, DeliveryRequest, MediaItem};
///
/// # async fn example() -> media_relay::Result<()> {
/// let relay = MediaRelay::new(Config::from_env()?)?;
/// let report = relay
///     .deliver(&DeliveryRequest {
///         title: "Spring walk".into(),
///         author: "mei".into(),
///         source_tag: "xhs".into(),
///         canonical_link: None,
///         items: vec![MediaItem::photo("https://cdn.example/a.jpg")],
///     })
///     .await?;
/// println!("{} delivered, {} failed", report.delivered, report.failed);
/// # Ok(())
/// # }
/// ```
pub struct MediaRelay {
    config: Arc<Config>,
    platform: Option<Arc<dyn MessagingPlatform>>,
    relay: Option<Arc<dyn LargeFileRelay>>,
    prober: Option<SizeProber>,
    classifier: Arc<dyn FailureClassifier>,
}

impl MediaRelay {
    /// Build the pipeline with the Bot API client and the HTTP relay from `config`
    ///
    /// A missing bot token is not an error here: it is reported per request so the
    /// server can start and answer health checks.
    pub fn new(config: Config) -> Result<Self> {
        let classifier = config.delivery.oversize_detection.classifier()?;

        let platform: Option<Arc<dyn MessagingPlatform>> = match config.bot_token() {
            Ok(token) => Some(Arc::new(BotApiClient::new(&config.telegram, token)?)),
            Err(_) => None,
        };

        let relay: Option<Arc<dyn LargeFileRelay>> = match &config.relay {
            Some(relay_config) => Some(Arc::new(HttpRelayClient::new(relay_config)?)),
            None => None,
        };

        let prober = if config.delivery.size_probe {
            Some(SizeProber::new(
                &config.delivery,
                &config.retry,
                classifier.clone(),
            )?)
        } else {
            None
        };

        tracing::info!(
            classifier = classifier.name(),
            relay = relay.as_ref().map(|r| r.endpoint()).unwrap_or("none"),
            size_probe = config.delivery.size_probe,
            "Media relay configured"
        );

        Ok(Self {
            config: Arc::new(config),
            platform,
            relay,
            prober,
            classifier,
        })
    }

    /// Replace the messaging platform
    pub fn with_platform(mut self, platform: Arc<dyn MessagingPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace (or add) the large-file relay
    pub fn with_relay(mut self, relay: Arc<dyn LargeFileRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Replace the failure classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Configuration the pipeline was built from
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Deliver every item of `request` to every destination it fans out to
    ///
    /// Fails as a whole only for an invalid request or missing configuration;
    /// every delivery failure is reported in the returned [`DeliveryReport`].
    pub async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReport> {
        request.validate()?;
        let destinations = self.config.destinations_for(&request.source_tag)?;
        let platform = match &self.platform {
            Some(platform) => platform.as_ref(),
            None => {
                // Without an injected platform the client exists exactly when a token does
                self.config.bot_token()?;
                return Err(Error::Other("messaging platform is not available".to_string()));
            }
        };

        let groups = partition(&request.items, MAX_GROUP_SIZE);
        let hints = self.probe_hints(request).await;

        tracing::info!(
            items = request.items.len(),
            groups = groups.len(),
            destinations = destinations.len(),
            source = %request.source_tag,
            "Relaying batch"
        );

        let tiers = Tiers {
            platform,
            relay: self.relay.as_deref(),
            classifier: self.classifier.as_ref(),
            retry: &self.config.retry,
        };

        let reports = join_all(
            destinations
                .iter()
                .map(|destination| self.deliver_to(&tiers, destination, request, &groups, &hints)),
        )
        .await;

        let report = DeliveryReport::new(reports);
        if report.is_complete() {
            tracing::info!(delivered = report.delivered, "Batch delivered");
        } else {
            tracing::warn!(
                delivered = report.delivered,
                failed = report.failed,
                "Batch partially delivered"
            );
        }
        Ok(report)
    }

    /// Size hints by batch position; all unknown unless probing can matter
    async fn probe_hints(&self, request: &DeliveryRequest) -> Vec<SizeHint> {
        match &self.prober {
            Some(prober) if self.relay.is_some() => prober.probe_all(&request.items).await,
            _ => vec![SizeHint::Unknown; request.items.len()],
        }
    }

    async fn deliver_to(
        &self,
        tiers: &Tiers<'_>,
        destination: &Destination,
        request: &DeliveryRequest,
        groups: &[Group<'_>],
        hints: &[SizeHint],
    ) -> DestinationReport {
        let caption = format_caption(request, destination.caption_policy, &self.config.caption);
        let rich = destination.caption_policy.uses_rich_formatting();
        let threshold = self.config.delivery.oversize_threshold_bytes;

        let mut outcomes = Vec::with_capacity(request.items.len());
        for (group, group_caption) in groups.iter().zip(plan_captions(&caption, groups.len())) {
            let target = SendTarget {
                chat_id: &destination.channel,
                caption: group_caption,
                rich,
            };
            outcomes.extend(deliver_group(tiers, &target, group, hints, threshold).await);
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        tracing::debug!(
            channel = %destination.channel,
            outcomes = outcomes.len(),
            failed,
            "Destination finished"
        );

        DestinationReport {
            channel: destination.channel.clone(),
            caption_policy: destination.caption_policy,
            caption,
            outcomes,
        }
    }
}

/// Caption for each group of a destination: the full caption on the first, empty after
pub fn plan_captions(caption: &str, group_count: usize) -> Vec<&str> {
    (0..group_count)
        .map(|i| if i == 0 { caption } else { "" })
        .collect()
}
