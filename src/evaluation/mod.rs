//! Model evaluation
//!
//! Scores persisted variants on their generation's held-out split, writes one
//! markdown report per variant and a `model_comparison.csv` ranking them.

mod report;

pub use report::{
    format_currency, group_thousands, render_report, Currency, PerformanceBand, TOP_FEATURES,
};

use crate::artifacts::ArtifactStore;
use crate::error::{PredictorError, Result};
use crate::training::{ModelVariant, RegressionMetrics, Regressor};
use crate::utils::write_csv;
use chrono::Utc;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File names of the processed split CSVs written by the training pipeline.
pub const X_TRAIN_FILE: &str = "X_train_processed.csv";
pub const X_TEST_FILE: &str = "X_test_processed.csv";
pub const Y_TRAIN_FILE: &str = "y_train.csv";
pub const Y_TEST_FILE: &str = "y_test.csv";
pub const COMPARISON_FILE: &str = "model_comparison.csv";

/// Metrics plus the raw predictions they were computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metrics: RegressionMetrics,
    pub predictions: Array1<f64>,
    pub residuals: Array1<f64>,
}

impl EvaluationResult {
    pub fn new(y_true: &Array1<f64>, predictions: Array1<f64>) -> Self {
        let metrics = RegressionMetrics::compute(y_true, &predictions);
        let residuals = y_true - &predictions;
        Self {
            metrics,
            predictions,
            residuals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Evaluation of one persisted variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub variant: ModelVariant,
    pub result: EvaluationResult,
    pub feature_importances: Option<Vec<FeatureImportance>>,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    store: ArtifactStore,
    report_dir: PathBuf,
}

impl ModelEvaluator {
    /// Reports are written next to the models unless redirected.
    pub fn new(store: ArtifactStore) -> Self {
        let report_dir = store.root().to_path_buf();
        Self { store, report_dir }
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    pub fn evaluate<M: Regressor + ?Sized>(
        model: &M,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<EvaluationResult> {
        if x_test.nrows() != y_test.len() {
            return Err(PredictorError::shape_mismatch(x_test.nrows(), y_test.len()));
        }
        let predictions = model.predict(x_test)?;
        Ok(EvaluationResult::new(y_test, predictions))
    }

    /// Importances named by `feature_columns`, most important first.
    /// `None` for models without importances.
    pub fn feature_importance_table<M: Regressor + ?Sized>(
        model: &M,
        feature_columns: &[String],
    ) -> Option<Vec<FeatureImportance>> {
        let importances = model.feature_importances()?;
        let mut table: Vec<FeatureImportance> = feature_columns
            .iter()
            .zip(importances.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        table.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Some(table)
    }

    /// Held-out split saved with `generation`, checked against its feature
    /// columns.
    pub fn load_test_split(
        &self,
        generation: &str,
        feature_columns: &[String],
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let split = self.store.load_test_split(generation)?;
        if split.x_test.ncols() != feature_columns.len() {
            return Err(PredictorError::Shape {
                expected: format!("{} features", feature_columns.len()),
                actual: format!("{} features", split.x_test.ncols()),
            });
        }
        Ok((split.x_test, split.y_test))
    }

    /// Generation to evaluate: the store's active one, else the pointer's.
    fn generation(&self) -> Result<String> {
        match self.store.generation() {
            Some(generation) => Ok(generation.to_string()),
            None => self.store.active_generation_on_disk(),
        }
    }

    /// Evaluate every variant persisted in the generation, write the reports
    /// and the comparison table. Results are sorted by R², best first.
    pub fn evaluate_all(&self) -> Result<Vec<ModelEvaluation>> {
        let generation = self.generation()?;
        let bundle = self.store.load_preprocessing(&generation)?;
        let feature_columns = bundle.feature_columns();
        let (x_test, y_test) = self.load_test_split(&generation, feature_columns)?;
        fs::create_dir_all(&self.report_dir)?;

        let variants = self.store.list_models(&generation)?;
        if variants.is_empty() {
            warn!(generation = %generation, "No persisted models to evaluate");
        }

        let mut evaluations = Vec::with_capacity(variants.len());
        for variant in variants {
            let stored = self.store.load_model(&generation, variant)?;
            let result = Self::evaluate(&stored.model, &x_test, &y_test)?;
            let importances = Self::feature_importance_table(&stored.model, feature_columns);

            let report = render_report(variant, &result, importances.as_deref(), Utc::now());
            let report_path = self
                .report_dir
                .join(format!("{}_evaluation_report.md", variant));
            fs::write(&report_path, report)?;

            info!(
                %variant,
                r2 = result.metrics.r2,
                rmse = result.metrics.rmse,
                mae = result.metrics.mae,
                report = %report_path.display(),
                "Evaluated model"
            );

            evaluations.push(ModelEvaluation {
                variant,
                result,
                feature_importances: importances,
                report_path,
            });
        }

        evaluations.sort_by(|a, b| b.result.metrics.r2.total_cmp(&a.result.metrics.r2));
        write_comparison(&evaluations, &self.report_dir.join(COMPARISON_FILE))?;
        Ok(evaluations)
    }
}

/// Write the ranking table in the order given.
pub fn write_comparison(evaluations: &[ModelEvaluation], path: &Path) -> Result<()> {
    let names: Vec<String> = evaluations.iter().map(|e| e.variant.to_string()).collect();
    let metric = |f: fn(&RegressionMetrics) -> f64| -> Vec<f64> {
        evaluations.iter().map(|e| f(&e.result.metrics)).collect()
    };

    let mut df = DataFrame::new(vec![
        Column::new("Model".into(), names),
        Column::new("R² Score".into(), metric(|m| m.r2)),
        Column::new("RMSE".into(), metric(|m| m.rmse)),
        Column::new("MAE".into(), metric(|m| m.mae)),
        Column::new("MAPE".into(), metric(|m| m.mape)),
    ])?;
    write_csv(&mut df, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearRegression, RandomForestRegressor, TrainedModel};
    use ndarray::array;

    #[test]
    fn test_evaluate_linear_fit_is_exact() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = TrainedModel::LinearRegression(LinearRegression::new());
        model.fit(&x, &y).unwrap();

        let result = ModelEvaluator::evaluate(&model, &x, &y).unwrap();
        assert!((result.metrics.r2 - 1.0).abs() < 1e-9);
        assert!(result.residuals.iter().all(|r| r.abs() < 1e-9));
        assert!(ModelEvaluator::feature_importance_table(&model, &["x".to_string()]).is_none());
    }

    #[test]
    fn test_importance_table_sorted_and_named() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { (i % 2) as f64 } else { i as f64 });
        let y = x.column(1).to_owned();
        let mut forest = RandomForestRegressor::new(5);
        forest.fit(&x, &y).unwrap();

        let model = TrainedModel::RandomForest(forest);
        let names = vec!["parity".to_string(), "experience_years".to_string()];
        let table = ModelEvaluator::feature_importance_table(&model, &names).unwrap();
        assert_eq!(table[0].feature, "experience_years");
        assert!(table[0].importance >= table[1].importance);
    }
}
