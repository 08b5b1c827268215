//! Application state for the API server

use crate::{Config, MediaRelay};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the delivery pipeline and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The delivery pipeline
    pub relay: Arc<MediaRelay>,

    /// Configuration (read-only for the process lifetime)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(relay: Arc<MediaRelay>, config: Arc<Config>) -> Self {
        Self { relay, config }
    }
}
