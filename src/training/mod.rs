//! Model training
//!
//! Native regressors for the six salary model variants, regression
//! metrics, a seeded train/test split and the Model Registry that trains
//! the variants and selects the best one.

mod models;
mod registry;
mod split;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use decision_tree::{RegressionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::{LassoRegression, LinearCoefficients, LinearRegression, RidgeRegression};
pub use models::{ModelVariant, RegressionMetrics, Regressor, TrainedModel};
pub use random_forest::RandomForestRegressor;
pub use registry::{
    BestModel, BestModelTracker, ModelFactory, ModelRegistry, TrainingRecord, TrainingSummary,
    VariantOutcome,
};
pub use split::{shuffle_split, train_test_split, SplitIndices, TrainTestSplit};
pub use svm::{SupportVectorRegressor, SvrConfig};
