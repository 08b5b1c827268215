//! In-memory collaborators for driving the ladder deterministically

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::classify::UpstreamFailure;
use crate::config::RetryConfig;
use crate::error::DeliveryError;
use crate::relay::{LargeFileRelay, RelayJob};
use crate::telegram::{MessagingPlatform, SendTarget};
use crate::types::MediaItem;

/// Retry policy with millisecond delays
pub(crate) fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// A call the fake platform received
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ByReference {
        chat_id: String,
        url: String,
        caption: String,
    },
    Group {
        chat_id: String,
        caption: String,
        urls: Vec<String>,
    },
    Reupload {
        chat_id: String,
        url: String,
        caption: String,
    },
}

/// Failure script: `None` remaining means "always"
#[derive(Clone)]
struct Scripted {
    failure: UpstreamFailure,
    remaining: Option<u32>,
}

#[derive(Default)]
struct FakeState {
    by_reference: HashMap<String, Scripted>,
    reupload: HashMap<String, Scripted>,
    group: Option<UpstreamFailure>,
    calls: Vec<Call>,
}

/// [`MessagingPlatform`] that succeeds unless told otherwise
#[derive(Default)]
pub(crate) struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_by_reference(&self, url: &str, failure: UpstreamFailure) {
        let scripted = Scripted {
            failure,
            remaining: None,
        };
        self.state
            .lock()
            .unwrap()
            .by_reference
            .insert(url.to_string(), scripted);
    }

    pub(crate) fn fail_by_reference_times(&self, url: &str, times: u32, failure: UpstreamFailure) {
        let scripted = Scripted {
            failure,
            remaining: Some(times),
        };
        self.state
            .lock()
            .unwrap()
            .by_reference
            .insert(url.to_string(), scripted);
    }

    pub(crate) fn fail_reupload(&self, url: &str, failure: UpstreamFailure) {
        let scripted = Scripted {
            failure,
            remaining: None,
        };
        self.state
            .lock()
            .unwrap()
            .reupload
            .insert(url.to_string(), scripted);
    }

    pub(crate) fn fail_group(&self, failure: UpstreamFailure) {
        self.state.lock().unwrap().group = Some(failure);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn outcome(
        table: &mut HashMap<String, Scripted>,
        url: &str,
    ) -> Result<Value, UpstreamFailure> {
        match table.get_mut(url) {
            Some(scripted) => match scripted.remaining {
                None => Err(scripted.failure.clone()),
                Some(0) => Ok(json!({"message_id": 1})),
                Some(ref mut n) => {
                    *n -= 1;
                    Err(scripted.failure.clone())
                }
            },
            None => Ok(json!({"message_id": 1})),
        }
    }
}

#[async_trait]
impl MessagingPlatform for FakePlatform {
    async fn send_by_reference(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> Result<Value, UpstreamFailure> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ByReference {
            chat_id: target.chat_id.to_string(),
            url: item.url.clone(),
            caption: target.caption.to_string(),
        });
        Self::outcome(&mut state.by_reference, &item.url)
    }

    async fn send_group_by_reference(
        &self,
        target: &SendTarget<'_>,
        items: &[MediaItem],
    ) -> Result<Value, UpstreamFailure> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Group {
            chat_id: target.chat_id.to_string(),
            caption: target.caption.to_string(),
            urls: items.iter().map(|i| i.url.clone()).collect(),
        });
        match &state.group {
            Some(failure) => Err(failure.clone()),
            None => Ok(json!([{"message_id": 1}])),
        }
    }

    async fn reupload(
        &self,
        target: &SendTarget<'_>,
        item: &MediaItem,
    ) -> Result<Value, UpstreamFailure> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Reupload {
            chat_id: target.chat_id.to_string(),
            url: item.url.clone(),
            caption: target.caption.to_string(),
        });
        Self::outcome(&mut state.reupload, &item.url)
    }
}

/// [`LargeFileRelay`] that records jobs and accepts or declines all of them
#[derive(Default)]
pub(crate) struct FakeRelay {
    decline: Option<String>,
    jobs: Mutex<Vec<RelayJob>>,
}

impl FakeRelay {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn declining(message: &str) -> Self {
        Self {
            decline: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn jobs(&self) -> Vec<RelayJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl LargeFileRelay for FakeRelay {
    async fn delegate(&self, job: &RelayJob) -> Result<Value, DeliveryError> {
        self.jobs.lock().unwrap().push(job.clone());
        match &self.decline {
            Some(message) => Err(DeliveryError::RelayDeclined(message.clone())),
            None => Ok(json!({"ok": true})),
        }
    }

    fn endpoint(&self) -> &str {
        "fake://relay"
    }
}
