//! Shared application state

use crate::config::AppConfig;
use crate::inference::InferenceService;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// State shared by every handler.
///
/// Predictions hold the read lock for their whole duration and reloads take
/// the write lock, so a reload never swaps the model under a running
/// prediction.
pub struct AppState {
    pub config: AppConfig,
    pub service: RwLock<InferenceService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, service: InferenceService) -> Self {
        Self {
            config,
            service: RwLock::new(service),
            started_at: Utc::now(),
        }
    }
}
