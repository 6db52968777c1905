use std::sync::Arc;

use crate::pipeline::Session;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The one in-memory workspace: selected files, current batch, sort, notifications.
    pub session: Arc<Session>,
}
