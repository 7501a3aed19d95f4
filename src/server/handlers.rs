//! Request handlers

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::error::PredictorError;
use crate::inference::{ModelInfo, Prediction};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub model_loaded: bool,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.service.read().await.is_loaded();
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        model_loaded,
    })
}

/// Run `f` against the loaded service on the blocking pool, holding the
/// read lock until it returns.
async fn with_service<T, F>(state: Arc<AppState>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&crate::inference::InferenceService) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let service = state.service.blocking_read();
        f(&service)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Prediction task failed: {}", e)))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Prediction>> {
    let Json(record) = body?;
    let prediction = with_service(state, move |service| service.predict_value(&record)).await??;
    Ok(Json(prediction))
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfo> {
    Json(state.service.read().await.model_info())
}

fn slot_error(err: &PredictorError) -> Value {
    let details = match err {
        PredictorError::Validation(messages) => messages.clone(),
        other => vec![other.to_string()],
    };
    json!({
        "error": err.to_string(),
        "details": details,
    })
}

pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = body?;
    let Value::Array(records) = body else {
        return Err(ServerError::bad_request("Input must be a list of records"));
    };

    let results = with_service(state, move |service| {
        if !service.is_loaded() {
            return Err(PredictorError::NotLoaded);
        }
        Ok(service.predict_batch(&records))
    })
    .await??;

    let predictions: Vec<Value> = results
        .iter()
        .map(|slot| match slot {
            Ok(prediction) => serde_json::to_value(prediction)
                .unwrap_or_else(|e| slot_error(&PredictorError::from(e))),
            Err(err) => slot_error(err),
        })
        .collect();

    Ok(Json(json!({ "predictions": predictions })))
}

#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    pub model_name: String,
}

pub async fn reload_model(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ReloadRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;

    // Artifact reads happen on the blocking pool under the write lock
    let loaded = tokio::task::spawn_blocking(move || {
        let mut service = state.service.blocking_write();
        match service.load_by_name(&request.model_name) {
            Ok(variant) => Ok((variant, service.model_info())),
            Err(err) => {
                warn!(model = %request.model_name, error = %err, "Reload failed, keeping current model");
                Err(err)
            }
        }
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Reload task failed: {}", e)))?;

    let (variant, model_info) = loaded?;
    info!(model = %variant, "Reloaded model");
    Ok(Json(json!({
        "status": "loaded",
        "model_name": variant,
        "model_info": model_info,
    })))
}
