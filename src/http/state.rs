use crate::session::LiveSessionController;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single live-session controller; exactly one session runs at a time
    pub controller: Arc<LiveSessionController>,
}

impl AppState {
    pub fn new(controller: Arc<LiveSessionController>) -> Self {
        Self { controller }
    }
}
