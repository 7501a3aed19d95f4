//! Salary Predictor - salary regression pipeline
//!
//! This crate covers the whole lifecycle of a salary model:
//! - Data cleaning, label encoding and standard scaling
//! - Training a fixed family of regressors and selecting the best one
//! - Generation-stamped artifact persistence
//! - Evaluation reports and model comparison
//! - An HTTP inference service and a CLI
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Cleaning, outliers, encoders, scaler, preprocessing bundle
//! - [`training`] - Regressors, metrics, train/test split, model registry
//! - [`artifacts`] - Artifact store keyed by training generation
//! - [`inference`] - Input validation and the inference service
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end processing and training run
//! - [`evaluation`] - Test-split evaluation, markdown reports, comparison table
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod artifacts;
pub mod inference;

// Orchestration
pub mod pipeline;
pub mod evaluation;

// Utilities
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{PredictorError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PredictorError, Result};

    // Configuration
    pub use crate::config::{AppConfig, ConfigOverrides, Environment};

    // Preprocessing
    pub use crate::preprocessing::{
        clean_dataset, CleaningReport, LabelEncoder, OutlierMethod, PreprocessingBundle,
        StandardScaler,
    };

    // Training
    pub use crate::training::{
        train_test_split, ModelRegistry, ModelVariant, RegressionMetrics, Regressor,
        TrainedModel, TrainingRecord, TrainingSummary,
    };

    // Artifacts
    pub use crate::artifacts::{ArtifactStore, BestModelPointer, StoredModel};

    // Inference
    pub use crate::inference::{InferenceService, Prediction};

    // Orchestration
    pub use crate::evaluation::{EvaluationResult, ModelEvaluator};
    pub use crate::pipeline::{PipelineReport, TrainingPipeline};
}
