//! Tier escalation state machine
//!
//! ```text
//! PENDING ──probe: oversize + relay──────────────────────────────► RELAY
//!    │
//!    └──► BY_REFERENCE ──ok──► DONE
//!              │ oversize + relay ───────────────────────────────► RELAY
//!              └ any other failure ──► REUPLOAD ──ok──► DONE
//!                                        │ oversize / transient + relay ─► RELAY
//!                                        └ otherwise ──► FAILED
//! RELAY ──ok──► DONE, otherwise FAILED
//! ```
//!
//! Transitions are the pure functions [`initial_tier`] and [`next_after_failure`];
//! [`deliver_item`] and [`deliver_group`] drive them against real collaborators.

use serde_json::Value;

use super::tiers::Tiers;
use crate::classify::FailureClass;
use crate::error::DeliveryError;
use crate::partition::Group;
use crate::probe::SizeHint;
use crate::telegram::SendTarget;
use crate::types::{DeliveryOutcome, FailureDetail, FailureKind, MediaItem, Tier};

/// Where one item (or group) stands for one destination
#[derive(Clone, Debug, PartialEq)]
pub enum LadderState {
    /// About to try this tier
    Attempting(Tier),
    /// Delivered
    Done {
        /// Tier that delivered
        tier: Tier,
        /// Platform or relay reply
        payload: Value,
    },
    /// No tier left to try
    Failed,
}

/// First tier for an item
///
/// Only a probe that confirms the item is over the threshold skips straight to
/// the relay, and only when one exists.
pub fn initial_tier(hint: SizeHint, threshold: u64, relay_configured: bool) -> Tier {
    if relay_configured && hint.exceeds(threshold) {
        Tier::ExternalRelay
    } else {
        Tier::ByReference
    }
}

/// State after `tier` failed with `class`
pub fn next_after_failure(tier: Tier, class: FailureClass, relay_configured: bool) -> LadderState {
    match (tier, class) {
        (Tier::ByReference, FailureClass::Oversize) if relay_configured => {
            LadderState::Attempting(Tier::ExternalRelay)
        }
        (Tier::ByReference, _) => LadderState::Attempting(Tier::StreamedReupload),
        (Tier::StreamedReupload, FailureClass::Oversize | FailureClass::Transient)
            if relay_configured =>
        {
            LadderState::Attempting(Tier::ExternalRelay)
        }
        (Tier::StreamedReupload, _) => LadderState::Failed,
        (Tier::ExternalRelay, _) => LadderState::Failed,
    }
}

/// Outcome error for the last failure of a tier
pub fn failure_detail(tier: Tier, error: &DeliveryError) -> FailureDetail {
    let kind = if tier == Tier::ExternalRelay {
        FailureKind::RelayFailure
    } else {
        match error.class() {
            FailureClass::Oversize => FailureKind::UpstreamOversize,
            FailureClass::Transient => FailureKind::TransientExhausted,
            FailureClass::Rejected => FailureKind::UpstreamRejection,
        }
    };

    FailureDetail {
        kind,
        tier,
        message: error.to_string(),
        status: error.status(),
    }
}

/// Drive one item through the ladder for one destination
pub async fn deliver_item(
    tiers: &Tiers<'_>,
    target: &SendTarget<'_>,
    item: &MediaItem,
    group: usize,
    position: usize,
    hint: SizeHint,
    threshold: u64,
) -> DeliveryOutcome {
    let relay_configured = tiers.relay_configured();
    let mut state = LadderState::Attempting(initial_tier(hint, threshold, relay_configured));
    let mut tiers_attempted = Vec::new();
    let mut attempts = 0;
    let mut last_failure: Option<(Tier, DeliveryError)> = None;

    while let LadderState::Attempting(tier) = state {
        let attempt = tiers.attempt(tier, target, item).await;
        tiers_attempted.push(tier);
        attempts += attempt.attempt_count;

        state = match attempt.result {
            Ok(payload) => LadderState::Done { tier, payload },
            Err(e) => {
                let next = next_after_failure(tier, e.class(), relay_configured);
                if let LadderState::Attempting(next_tier) = next {
                    tracing::info!(
                        channel = %target.chat_id,
                        item = position,
                        from = %tier,
                        to = %next_tier,
                        error = %e,
                        "Escalating delivery tier"
                    );
                }
                last_failure = Some((tier, e));
                next
            }
        };
    }

    let mut outcome = DeliveryOutcome {
        group,
        items: vec![position],
        tier_used: None,
        tiers_attempted,
        attempts,
        success: false,
        payload: None,
        error: None,
    };

    match state {
        LadderState::Done { tier, payload } => {
            outcome.tier_used = Some(tier);
            outcome.success = true;
            outcome.payload = Some(payload);
        }
        _ => {
            let detail = last_failure.map(|(tier, e)| failure_detail(tier, &e));
            tracing::warn!(
                channel = %target.chat_id,
                item = position,
                error = ?detail.as_ref().map(|d| &d.message),
                "Item could not be delivered"
            );
            outcome.error = detail;
        }
    }

    outcome
}

/// Deliver one group to one destination
///
/// Groups of two or more are first sent as one media group by reference; on any
/// failure (or when a probe routes a member to the relay) each item runs the
/// single-item ladder in order. The group's caption stays on its first item.
pub async fn deliver_group(
    tiers: &Tiers<'_>,
    target: &SendTarget<'_>,
    group: &Group<'_>,
    hints: &[SizeHint],
    threshold: u64,
) -> Vec<DeliveryOutcome> {
    let hint_at = |position: usize| hints.get(position).copied().unwrap_or_default();

    if group.len() >= 2 {
        let relay_bound = tiers.relay_configured()
            && group
                .positions()
                .into_iter()
                .any(|p| hint_at(p).exceeds(threshold));

        if relay_bound {
            tracing::debug!(
                channel = %target.chat_id,
                group = group.index,
                "Probe routes a member to the relay, sending items individually"
            );
        } else {
            let attempt = tiers.attempt_group(target, group.items).await;
            match attempt.result {
                Ok(payload) => {
                    return vec![DeliveryOutcome {
                        group: group.index,
                        items: group.positions(),
                        tier_used: Some(Tier::ByReference),
                        tiers_attempted: vec![Tier::ByReference],
                        attempts: attempt.attempt_count,
                        success: true,
                        payload: Some(payload),
                        error: None,
                    }];
                }
                Err(e) => {
                    tracing::info!(
                        channel = %target.chat_id,
                        group = group.index,
                        items = group.len(),
                        error = %e,
                        "Media group failed, decomposing into single items"
                    );
                }
            }
        }
    }

    let mut outcomes = Vec::with_capacity(group.len());
    for (i, item) in group.items.iter().enumerate() {
        let position = group.offset + i;
        let item_target = if i == 0 { *target } else { target.uncaptioned() };
        outcomes.push(
            deliver_item(
                tiers,
                &item_target,
                item,
                group.index,
                position,
                hint_at(position),
                threshold,
            )
            .await,
        );
    }
    outcomes
}
