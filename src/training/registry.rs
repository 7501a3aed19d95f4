//! Model Registry
//!
//! Trains every registered variant on the same split and keeps the best one
//! by test R². Selection is a strict-improvement fold in registration order,
//! so the first variant to reach a score keeps it against later ties. An
//! improvement is written through to the artifact store immediately: model
//! file first, pointer second.

use super::models::{ModelVariant, RegressionMetrics, Regressor, TrainedModel};
use super::split::TrainTestSplit;
use crate::artifacts::{ArtifactStore, BestModelPointer, StoredModel};
use crate::config::ModelConfig;
use crate::error::{PredictorError, Result};
use crate::utils::Timer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One line of the training history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub variant: ModelVariant,
    pub train_r2: f64,
    pub test_r2: f64,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub train_mae: f64,
    pub test_mae: f64,
    /// Fit time in seconds
    pub training_time: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

impl TrainingRecord {
    pub fn new(
        variant: ModelVariant,
        train: &RegressionMetrics,
        test: &RegressionMetrics,
        training_time: f64,
    ) -> Self {
        Self {
            variant,
            train_r2: train.r2,
            test_r2: test.r2,
            train_rmse: train.rmse,
            test_rmse: test.rmse,
            train_mae: train.mae,
            test_mae: test.mae,
            training_time,
            timestamp: Utc::now(),
            generation: None,
        }
    }
}

/// Incumbent of a strict-improvement fold over scores
#[derive(Debug, Clone)]
pub struct BestModelTracker<K = ModelVariant> {
    best: Option<(K, f64)>,
}

impl<K> Default for BestModelTracker<K> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<K: Clone> BestModelTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a score; returns whether it replaced the incumbent.
    /// NaN never wins.
    pub fn observe(&mut self, key: K, score: f64) -> bool {
        let current = self.best.as_ref().map_or(f64::NEG_INFINITY, |(_, s)| *s);
        if score > current {
            self.best = Some((key, score));
            true
        } else {
            false
        }
    }

    /// `None` until a score has been observed.
    pub fn best(&self) -> Option<(K, f64)> {
        self.best.clone()
    }

    pub fn reset(&mut self) {
        self.best = None;
    }
}

/// Result of one variant within a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariantOutcome {
    Trained {
        record: TrainingRecord,
        became_best: bool,
    },
    Failed {
        variant: ModelVariant,
        reason: String,
    },
}

impl VariantOutcome {
    pub fn variant(&self) -> ModelVariant {
        match self {
            VariantOutcome::Trained { record, .. } => record.variant,
            VariantOutcome::Failed { variant, .. } => *variant,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VariantOutcome::Trained { .. })
    }
}

/// Best variant of a run and its test R²
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub variant: ModelVariant,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub outcomes: Vec<VariantOutcome>,
    pub best: Option<BestModel>,
    pub generation: Option<String>,
}

impl TrainingSummary {
    pub fn n_trained(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.outcomes.len() - self.n_trained()
    }

    pub fn record(&self, variant: ModelVariant) -> Option<&TrainingRecord> {
        self.outcomes.iter().find_map(|o| match o {
            VariantOutcome::Trained { record, .. } if record.variant == variant => Some(record),
            _ => None,
        })
    }
}

/// Builds an unfitted model for one run
pub type ModelFactory = Box<dyn Fn() -> TrainedModel + Send + Sync>;

pub struct ModelRegistry {
    entries: Vec<(ModelVariant, ModelFactory)>,
    tracker: BestModelTracker,
    history: Vec<TrainingRecord>,
    persist_all_variants: bool,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            tracker: BestModelTracker::new(),
            history: Vec::new(),
            persist_all_variants: false,
        }
    }

    /// Registry with every variant, in canonical order, configured from `config`.
    pub fn with_defaults(config: &ModelConfig) -> Self {
        let mut registry = Self::new().with_persist_all_variants(config.persist_all_variants);
        registry.entries = ModelVariant::ALL
            .into_iter()
            .map(|variant| {
                let config = config.clone();
                let factory: ModelFactory =
                    Box::new(move || TrainedModel::from_config(variant, &config));
                (variant, factory)
            })
            .collect();
        registry
    }

    pub fn with_persist_all_variants(mut self, persist: bool) -> Self {
        self.persist_all_variants = persist;
        self
    }

    /// Add a variant to the run. A variant may be registered once.
    pub fn register(&mut self, variant: ModelVariant, factory: ModelFactory) -> Result<()> {
        if self.entries.iter().any(|(v, _)| *v == variant) {
            return Err(PredictorError::Config(format!(
                "Model variant {} is already registered",
                variant
            )));
        }
        self.entries.push((variant, factory));
        Ok(())
    }

    pub fn variants(&self) -> Vec<ModelVariant> {
        self.entries.iter().map(|(v, _)| *v).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current incumbent, `None` before any variant has trained.
    pub fn best(&self) -> Option<BestModel> {
        self.tracker
            .best()
            .map(|(variant, score)| BestModel { variant, score })
    }

    /// Records appended by every run of this registry.
    pub fn history(&self) -> &[TrainingRecord] {
        &self.history
    }

    /// Train every registered variant on `split`.
    ///
    /// A variant whose fit fails is logged and reported as
    /// [`VariantOutcome::Failed`]; the run continues. Errors from the store
    /// abort the run.
    pub fn train_all(
        &mut self,
        split: &TrainTestSplit,
        store: Option<&ArtifactStore>,
    ) -> Result<TrainingSummary> {
        self.tracker.reset();
        let generation = store.and_then(|s| s.generation()).map(str::to_string);
        let mut outcomes = Vec::with_capacity(self.entries.len());

        info!(
            n_variants = self.entries.len(),
            n_train = split.x_train.nrows(),
            n_test = split.x_test.nrows(),
            "Training model variants"
        );

        for (variant, factory) in &self.entries {
            let variant = *variant;
            let (model, mut record) = match fit_and_score(variant, factory(), split) {
                Ok(trained) => trained,
                Err(err) => {
                    warn!(%variant, error = %err, "Variant failed to train, continuing");
                    outcomes.push(VariantOutcome::Failed {
                        variant,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            record.generation = generation.clone();

            info!(
                %variant,
                train_r2 = record.train_r2,
                test_r2 = record.test_r2,
                test_rmse = record.test_rmse,
                test_mae = record.test_mae,
                training_time = record.training_time,
                "Trained variant"
            );

            self.history.push(record.clone());
            if let Some(store) = store {
                store.append_training_record(&record)?;
            }

            let became_best = self.tracker.observe(variant, record.test_r2);
            if let Some(store) = store {
                if became_best || self.persist_all_variants {
                    store.save_model(&StoredModel {
                        record: record.clone(),
                        model,
                    })?;
                }
                if became_best {
                    let generation = store.generation().unwrap_or_default();
                    store.save_best_pointer(&BestModelPointer::new(
                        variant,
                        record.test_r2,
                        generation,
                    ))?;
                }
            }
            if became_best {
                info!(%variant, test_r2 = record.test_r2, "New best model");
            }

            outcomes.push(VariantOutcome::Trained {
                record,
                became_best,
            });
        }

        let best = self.best();
        match &best {
            Some(b) => info!(best_model = %b.variant, best_score = b.score, "Training run finished"),
            None => warn!("Training run finished without a successful variant"),
        }

        Ok(TrainingSummary {
            outcomes,
            best,
            generation,
        })
    }
}

fn fit_and_score(
    variant: ModelVariant,
    mut model: TrainedModel,
    split: &TrainTestSplit,
) -> Result<(TrainedModel, TrainingRecord)> {
    let training_failure = |reason: String| PredictorError::Training {
        variant: variant.to_string(),
        reason,
    };

    let timer = Timer::start();
    model
        .fit(&split.x_train, &split.y_train)
        .map_err(|e| training_failure(e.to_string()))?;
    let training_time = timer.elapsed_secs();

    let train_pred = model
        .predict(&split.x_train)
        .map_err(|e| training_failure(e.to_string()))?;
    let test_pred = model
        .predict(&split.x_test)
        .map_err(|e| training_failure(e.to_string()))?;
    if train_pred.iter().chain(test_pred.iter()).any(|p| !p.is_finite()) {
        return Err(training_failure("non-finite predictions".to_string()));
    }

    let train = RegressionMetrics::compute(&split.y_train, &train_pred);
    let test = RegressionMetrics::compute(&split.y_test, &test_pred);
    Ok((model, TrainingRecord::new(variant, &train, &test, training_time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_first_to_reach_a_score_wins() {
        let mut tracker: BestModelTracker<&str> = BestModelTracker::new();
        assert!(tracker.best().is_none());

        let improved: Vec<bool> = [("a", 0.5), ("b", 0.8), ("c", 0.8), ("d", 0.7)]
            .into_iter()
            .map(|(k, s)| tracker.observe(k, s))
            .collect();

        assert_eq!(improved, vec![true, true, false, false]);
        assert_eq!(tracker.best(), Some(("b", 0.8)));
    }

    #[test]
    fn test_tracker_accepts_negative_scores_and_ignores_nan() {
        let mut tracker: BestModelTracker<&str> = BestModelTracker::new();
        assert!(!tracker.observe("nan", f64::NAN));
        assert!(tracker.observe("neg", -3.0));
        assert_eq!(tracker.best(), Some(("neg", -3.0)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let config = ModelConfig::default();
        let mut registry = ModelRegistry::new();
        let factory = || -> ModelFactory {
            let config = ModelConfig::default();
            Box::new(move || TrainedModel::from_config(ModelVariant::RidgeRegression, &config))
        };
        registry.register(ModelVariant::RidgeRegression, factory()).unwrap();
        assert!(registry.register(ModelVariant::RidgeRegression, factory()).is_err());

        let defaults = ModelRegistry::with_defaults(&config);
        assert_eq!(defaults.variants(), ModelVariant::ALL.to_vec());
        assert!(defaults.best().is_none());
    }
}
