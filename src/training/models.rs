//! Regressor trait, metrics and the closed set of model variants

use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::linear_models::{LassoRegression, LinearRegression, RidgeRegression};
use super::random_forest::RandomForestRegressor;
use super::svm::{SupportVectorRegressor, SvrConfig};
use crate::config::ModelConfig;
use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression metrics over one prediction set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error in percent, over non-zero targets
    pub mape: f64,
    pub residual_mean: f64,
    pub residual_std: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self::default();
        }
        let nf = n as f64;

        let residuals: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse = residuals.iter().map(|e| e * e).sum::<f64>() / nf;
        let mae = residuals.iter().map(|e| e.abs()).sum::<f64>() / nf;

        let y_mean = y_true.iter().take(n).sum::<f64>() / nf;
        let ss_tot: f64 = y_true.iter().take(n).map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = residuals.iter().map(|e| e * e).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        let (ape_sum, ape_count) = y_true
            .iter()
            .zip(residuals.iter())
            .filter(|(t, _)| **t != 0.0)
            .fold((0.0, 0usize), |(s, c), (t, e)| (s + (e / t).abs(), c + 1));
        let mape = if ape_count > 0 {
            ape_sum / ape_count as f64 * 100.0
        } else {
            0.0
        };

        let residual_mean = residuals.iter().sum::<f64>() / nf;
        let residual_std = (residuals
            .iter()
            .map(|e| (e - residual_mean).powi(2))
            .sum::<f64>()
            / nf)
            .sqrt();

        Self {
            r2,
            mse,
            rmse: mse.sqrt(),
            mae,
            mape,
            residual_mean,
            residual_std,
            n_samples: n,
        }
    }
}

/// Common interface of every regressor in the registry
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Normalized importances, tree models only.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Per-member predictions, one row per member. Only bagged ensembles
    /// return them; boosting stages predict residuals, not the target.
    fn estimator_predictions(&self, _x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    fn is_fitted(&self) -> bool;
}

/// Closed set of trainable variants, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    LinearRegression,
    RidgeRegression,
    LassoRegression,
    RandomForest,
    GradientBoosting,
    SupportVector,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 6] = [
        ModelVariant::LinearRegression,
        ModelVariant::RidgeRegression,
        ModelVariant::LassoRegression,
        ModelVariant::RandomForest,
        ModelVariant::GradientBoosting,
        ModelVariant::SupportVector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::LinearRegression => "linear_regression",
            ModelVariant::RidgeRegression => "ridge_regression",
            ModelVariant::LassoRegression => "lasso_regression",
            ModelVariant::RandomForest => "random_forest",
            ModelVariant::GradientBoosting => "gradient_boosting",
            ModelVariant::SupportVector => "support_vector",
        }
    }

    /// Whether the variant averages independently trained trees.
    pub fn is_bagged_ensemble(&self) -> bool {
        matches!(self, ModelVariant::RandomForest)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        ModelVariant::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| PredictorError::Config(format!("Unknown model variant: {}", s)))
    }
}

/// A regressor of any variant, serializable as one tagged document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", content = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    RidgeRegression(RidgeRegression),
    LassoRegression(LassoRegression),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    SupportVector(SupportVectorRegressor),
}

impl TrainedModel {
    /// Unfitted model for `variant` with hyperparameters from `config`.
    pub fn from_config(variant: ModelVariant, config: &ModelConfig) -> Self {
        let seed = config.random_state;
        match variant {
            ModelVariant::LinearRegression => TrainedModel::LinearRegression(LinearRegression::new()),
            ModelVariant::RidgeRegression => {
                TrainedModel::RidgeRegression(RidgeRegression::new(config.linear.ridge_alpha))
            }
            ModelVariant::LassoRegression => {
                TrainedModel::LassoRegression(LassoRegression::new(config.linear.lasso_alpha))
            }
            ModelVariant::RandomForest => TrainedModel::RandomForest(
                RandomForestRegressor::from_params(&config.random_forest, seed),
            ),
            ModelVariant::GradientBoosting => TrainedModel::GradientBoosting(
                GradientBoostingRegressor::new(GradientBoostingConfig::from_params(
                    &config.gradient_boosting,
                    seed,
                )),
            ),
            ModelVariant::SupportVector => TrainedModel::SupportVector(SupportVectorRegressor::new(
                SvrConfig::from_params(&config.support_vector),
            )),
        }
    }

    pub fn variant(&self) -> ModelVariant {
        match self {
            TrainedModel::LinearRegression(_) => ModelVariant::LinearRegression,
            TrainedModel::RidgeRegression(_) => ModelVariant::RidgeRegression,
            TrainedModel::LassoRegression(_) => ModelVariant::LassoRegression,
            TrainedModel::RandomForest(_) => ModelVariant::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelVariant::GradientBoosting,
            TrainedModel::SupportVector(_) => ModelVariant::SupportVector,
        }
    }
}

impl Regressor for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::LinearRegression(m) => m.fit(x, y),
            TrainedModel::RidgeRegression(m) => m.fit(x, y),
            TrainedModel::LassoRegression(m) => m.fit(x, y),
            TrainedModel::RandomForest(m) => m.fit(x, y),
            TrainedModel::GradientBoosting(m) => m.fit(x, y),
            TrainedModel::SupportVector(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LinearRegression(m) => m.predict(x),
            TrainedModel::RidgeRegression(m) => m.predict(x),
            TrainedModel::LassoRegression(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::SupportVector(m) => m.predict(x),
        }
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoosting(m) => m.feature_importances(),
            _ => None,
        }
    }

    fn estimator_predictions(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        match self {
            TrainedModel::RandomForest(m) => m.tree_predictions(x).map(Some),
            _ => Ok(None),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            TrainedModel::LinearRegression(m) => m.is_fitted(),
            TrainedModel::RidgeRegression(m) => m.is_fitted(),
            TrainedModel::LassoRegression(m) => m.is_fitted(),
            TrainedModel::RandomForest(m) => m.is_fitted(),
            TrainedModel::GradientBoosting(m) => m.is_fitted(),
            TrainedModel::SupportVector(m) => m.is_fitted(),
        }
    }
}
