//! Inference: input validation and the prediction service

mod service;
mod validation;

pub use service::{
    ConfidenceInterval, InferenceService, LoadedModel, ModelInfo, Prediction, ServiceState,
};
pub use validation::{validate_record, REQUIRED_FIELDS};
