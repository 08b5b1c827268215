//! Tiered delivery pipeline
//!
//! A batch is partitioned into groups of at most ten items, then every group is
//! driven through every destination. Each item climbs an escalation ladder of
//! three tiers:
//!
//! - [`Tier::ByReference`](crate::types::Tier::ByReference): the platform fetches
//!   the URL itself (`sendMediaGroup` for groups of two or more)
//! - [`Tier::StreamedReupload`](crate::types::Tier::StreamedReupload): the service
//!   streams the media into a multipart upload
//! - [`Tier::ExternalRelay`](crate::types::Tier::ExternalRelay): the large-file
//!   relay takes over
//!
//! Destinations run concurrently; groups within one destination run in order so
//! captions and ordering hold.

pub mod ladder;
mod orchestrator;
pub mod tiers;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

pub use ladder::{LadderState, initial_tier, next_after_failure};
pub use orchestrator::{MediaRelay, plan_captions};
pub use tiers::{TierAttempt, Tiers};
