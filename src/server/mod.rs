//! Salary prediction HTTP server
//!
//! Serves predictions from one loaded model variant. At startup the
//! configured default model is loaded; if that fails the server still starts
//! and reports `model_loaded: false` until a successful `/reload`.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{HealthResponse, ReloadRequest};
pub use state::AppState;

use crate::config::AppConfig;
use crate::inference::InferenceService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Build the shared state, attempting to load the default model.
pub fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let mut service = InferenceService::from_models_dir(&config.data.models_dir)?;
    match service.load_by_name(&config.api.default_model) {
        Ok(variant) => info!(model = %variant, "Default model loaded"),
        Err(e) => warn!(
            model = %config.api.default_model,
            error = %e,
            "Failed to load default model, starting without one. Train first or POST /reload"
        ),
    }
    Ok(Arc::new(AppState::new(config, service)))
}

/// Start the server and run until ctrl+c.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    let state = build_state(config)?;
    let started_at = state.started_at;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        started_at = %started_at.to_rfc3339(),
        "Salary prediction API listening"
    );

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        let uptime = chrono::Utc::now().signed_duration_since(started_at);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
