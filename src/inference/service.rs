//! Inference Service
//!
//! Owns the loaded model and its Preprocessing Bundle. The service is either
//! `Unloaded` or `Loaded`; a failed load leaves the previous state intact.

use super::validation::validate_record;
use crate::artifacts::{ArtifactStore, BestModelPointer};
use crate::error::{PredictorError, Result};
use crate::preprocessing::{PreprocessingBundle, Record};
use crate::training::{ModelVariant, Regressor, TrainedModel, TrainingRecord};
use chrono::{DateTime, Utc};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// z value of a two-sided 95% interval
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    /// `point ± 1.96 × σ` where σ is the population standard deviation of the
    /// ensemble members' predictions.
    pub fn from_members(point: f64, members: ArrayView1<f64>) -> Self {
        let std = members.std(0.0);
        Self {
            lower: point - Z_95 * std,
            upper: point + Z_95 * std,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_salary: f64,
    /// Present only for bagged tree ensembles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    pub model_used: ModelVariant,
    /// Test R² of the loaded variant
    pub model_accuracy: f64,
    pub prediction_timestamp: DateTime<Utc>,
}

/// Everything needed to serve one variant
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: TrainedModel,
    pub record: TrainingRecord,
    pub bundle: PreprocessingBundle,
    pub pointer: BestModelPointer,
}

impl LoadedModel {
    pub fn variant(&self) -> ModelVariant {
        self.model.variant()
    }
}

#[derive(Debug, Clone)]
pub enum ServiceState {
    Unloaded,
    Loaded(Box<LoadedModel>),
}

/// Snapshot of what the service is serving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_info: Option<BestModelPointer>,
    pub loaded_model: Option<ModelVariant>,
    pub generation: Option<String>,
    pub training_record: Option<TrainingRecord>,
    pub feature_columns: Vec<String>,
    pub available_encoders: Vec<String>,
    pub model_loaded: bool,
}

#[derive(Debug)]
pub struct InferenceService {
    store: ArtifactStore,
    state: ServiceState,
}

impl InferenceService {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            state: ServiceState::Unloaded,
        }
    }

    pub fn from_models_dir(models_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ArtifactStore::open(models_dir)?))
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ServiceState::Loaded(_))
    }

    pub fn loaded_variant(&self) -> Option<ModelVariant> {
        match &self.state {
            ServiceState::Loaded(loaded) => Some(loaded.variant()),
            ServiceState::Unloaded => None,
        }
    }

    /// Load `variant` from the generation named by the best-model pointer,
    /// together with that generation's preprocessing artifacts.
    pub fn load(&mut self, variant: ModelVariant) -> Result<()> {
        let loaded = self
            .read_artifacts(variant)
            .map_err(|source| PredictorError::ModelLoad {
                name: variant.to_string(),
                source: Box::new(source),
            })?;

        info!(
            variant = %variant,
            generation = %loaded.pointer.generation,
            test_r2 = loaded.record.test_r2,
            n_features = loaded.bundle.feature_columns().len(),
            "Model loaded"
        );
        self.state = ServiceState::Loaded(Box::new(loaded));
        Ok(())
    }

    /// [`load`](Self::load) by variant name.
    pub fn load_by_name(&mut self, name: &str) -> Result<ModelVariant> {
        let variant = name
            .parse::<ModelVariant>()
            .map_err(|source| PredictorError::ModelLoad {
                name: name.to_string(),
                source: Box::new(source),
            })?;
        self.load(variant)?;
        Ok(variant)
    }

    fn read_artifacts(&self, variant: ModelVariant) -> Result<LoadedModel> {
        let pointer = self.store.load_best_pointer()?;
        let stored = self.store.load_model(&pointer.generation, variant)?;
        let bundle = self.store.load_preprocessing(&pointer.generation)?;

        if !stored.model.is_fitted() {
            return Err(PredictorError::ModelNotFitted);
        }
        if let Some(generation) = &stored.record.generation {
            if *generation != pointer.generation {
                return Err(PredictorError::GenerationMismatch {
                    artifact: variant.to_string(),
                    expected: pointer.generation.clone(),
                    found: generation.clone(),
                });
            }
        }

        Ok(LoadedModel {
            model: stored.model,
            record: stored.record,
            bundle,
            pointer,
        })
    }

    pub fn unload(&mut self) {
        if let ServiceState::Loaded(loaded) = &self.state {
            info!(variant = %loaded.variant(), "Model unloaded");
        }
        self.state = ServiceState::Unloaded;
    }

    /// Validate, transform and predict one record.
    pub fn predict_one(&self, record: &Record) -> Result<Prediction> {
        let loaded = match &self.state {
            ServiceState::Loaded(loaded) => loaded,
            ServiceState::Unloaded => return Err(PredictorError::NotLoaded),
        };
        validate_record(record)?;

        let x = loaded.bundle.transform_records(std::slice::from_ref(record))?;
        let point = loaded
            .model
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| PredictorError::Computation("Model returned no prediction".to_string()))?;

        let confidence_interval = loaded
            .model
            .estimator_predictions(&x)?
            .map(|members| ConfidenceInterval::from_members(point, members.index_axis(Axis(1), 0)));

        debug!(
            variant = %loaded.variant(),
            predicted_salary = point,
            has_interval = confidence_interval.is_some(),
            "Prediction"
        );

        Ok(Prediction {
            predicted_salary: point,
            confidence_interval,
            model_used: loaded.variant(),
            model_accuracy: loaded.record.test_r2,
            prediction_timestamp: Utc::now(),
        })
    }

    /// [`predict_one`](Self::predict_one) on an arbitrary JSON value.
    pub fn predict_value(&self, value: &Value) -> Result<Prediction> {
        match value {
            Value::Object(record) => self.predict_one(record),
            _ => Err(PredictorError::Validation(vec![
                "Record must be a JSON object".to_string(),
            ])),
        }
    }

    /// Predict each record independently. The output has one slot per input,
    /// in input order; a failed record does not affect its neighbours.
    pub fn predict_batch(&self, records: &[Value]) -> Vec<Result<Prediction>> {
        let results: Vec<Result<Prediction>> =
            records.iter().map(|r| self.predict_value(r)).collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(total = records.len(), failed, "Batch prediction had failed records");
        }
        results
    }

    pub fn model_info(&self) -> ModelInfo {
        match &self.state {
            ServiceState::Loaded(loaded) => ModelInfo {
                model_info: Some(loaded.pointer.clone()),
                loaded_model: Some(loaded.variant()),
                generation: Some(loaded.pointer.generation.clone()),
                training_record: Some(loaded.record.clone()),
                feature_columns: loaded.bundle.feature_columns().to_vec(),
                available_encoders: loaded.bundle.available_encoders(),
                model_loaded: true,
            },
            ServiceState::Unloaded => ModelInfo {
                model_info: None,
                loaded_model: None,
                generation: None,
                training_record: None,
                feature_columns: Vec::new(),
                available_encoders: Vec::new(),
                model_loaded: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_interval_uses_population_std() {
        // std of [1, 3] with ddof 0 is 1
        let ci = ConfidenceInterval::from_members(2.0, array![1.0, 3.0].view());
        assert!((ci.lower - 0.04).abs() < 1e-12);
        assert!((ci.upper - 3.96).abs() < 1e-12);
    }

    #[test]
    fn test_unloaded_service_rejects_predictions() {
        let dir = TempDir::new().unwrap();
        let service = InferenceService::from_models_dir(dir.path()).unwrap();
        let record = Record::new();
        assert!(matches!(service.predict_one(&record), Err(PredictorError::NotLoaded)));
        assert!(!service.model_info().model_loaded);
    }

    #[test]
    fn test_load_without_artifacts_stays_unloaded() {
        let dir = TempDir::new().unwrap();
        let mut service = InferenceService::from_models_dir(dir.path()).unwrap();
        let err = service.load(ModelVariant::RandomForest).unwrap_err();
        match err {
            PredictorError::ModelLoad { source, .. } => {
                assert!(matches!(*source, PredictorError::ArtifactNotFound { .. }))
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!service.is_loaded());

        assert!(matches!(
            service.load_by_name("no_such_model"),
            Err(PredictorError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_prediction_json_omits_missing_interval() {
        let prediction = Prediction {
            predicted_salary: 1.0,
            confidence_interval: None,
            model_used: ModelVariant::RidgeRegression,
            model_accuracy: 0.5,
            prediction_timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&prediction).unwrap();
        assert!(json.get("confidence_interval").is_none());
        assert_eq!(json["model_used"], "ridge_regression");
    }
}
