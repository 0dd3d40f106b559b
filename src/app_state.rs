//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The notification hub: upgrades, publishing, and stats.
    pub hub: Arc<Hub>,
}
