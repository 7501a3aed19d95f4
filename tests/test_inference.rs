//! Integration tests for the inference service over a trained artifact set

mod common;

use common::{fast_config, salary_frame, valid_record};
use salary_predictor::config::AppConfig;
use salary_predictor::inference::{InferenceService, ServiceState};
use salary_predictor::pipeline::TrainingPipeline;
use salary_predictor::training::ModelVariant;
use salary_predictor::PredictorError;
use serde_json::json;
use tempfile::TempDir;

/// Train every variant, persisting all of them so any can be loaded.
fn trained() -> (TempDir, AppConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.model.persist_all_variants = true;
    TrainingPipeline::new(config.clone())
        .run_on_frame(&salary_frame(80))
        .unwrap();
    (dir, config)
}

fn service(config: &AppConfig) -> InferenceService {
    InferenceService::from_models_dir(&config.data.models_dir).unwrap()
}

#[test]
fn test_load_and_predict_with_interval_for_forest() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::RandomForest).unwrap();
    assert!(svc.is_loaded());

    let prediction = svc.predict_value(&valid_record()).unwrap();
    assert_eq!(prediction.model_used, ModelVariant::RandomForest);
    assert!(prediction.predicted_salary.is_finite());

    let ci = prediction.confidence_interval.expect("forest predictions carry an interval");
    assert!(ci.lower <= prediction.predicted_salary);
    assert!(ci.upper >= prediction.predicted_salary);
    assert!(
        ((ci.upper - prediction.predicted_salary) - (prediction.predicted_salary - ci.lower)).abs()
            < 1e-6
    );
}

#[test]
fn test_interval_absent_for_non_forest_variants() {
    let (_dir, config) = trained();
    let mut svc = service(&config);

    for variant in [
        ModelVariant::LinearRegression,
        ModelVariant::RidgeRegression,
        ModelVariant::LassoRegression,
        ModelVariant::GradientBoosting,
        ModelVariant::SupportVector,
    ] {
        svc.load(variant).unwrap();
        let prediction = svc.predict_value(&valid_record()).unwrap();
        assert!(prediction.confidence_interval.is_none(), "{}", variant);

        let body = serde_json::to_value(&prediction).unwrap();
        assert!(body.get("confidence_interval").is_none(), "{}", variant);
    }
}

#[test]
fn test_model_accuracy_is_the_loaded_variants_test_r2() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::RidgeRegression).unwrap();

    let info = svc.model_info();
    let record = info.training_record.unwrap();
    assert_eq!(record.variant, ModelVariant::RidgeRegression);

    let prediction = svc.predict_value(&valid_record()).unwrap();
    assert_eq!(prediction.model_accuracy, record.test_r2);
}

#[test]
fn test_prediction_is_deterministic() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::GradientBoosting).unwrap();

    let a = svc.predict_value(&valid_record()).unwrap();
    let b = svc.predict_value(&valid_record()).unwrap();
    assert_eq!(a.predicted_salary, b.predicted_salary);
    assert_eq!(a.confidence_interval, b.confidence_interval);
}

#[test]
fn test_batch_preserves_order_and_isolates_failures() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::RandomForest).unwrap();

    let mut broken = valid_record();
    broken.as_object_mut().unwrap().remove("company_size");
    let mut senior = valid_record();
    senior["experience_years"] = json!(15);

    let results = svc.predict_batch(&[valid_record(), broken, senior]);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[2].is_ok());
    match &results[1] {
        Err(PredictorError::Validation(messages)) => {
            assert_eq!(messages, &vec!["Missing required field: company_size".to_string()]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let single = svc.predict_value(&valid_record()).unwrap();
    assert_eq!(results[0].as_ref().unwrap().predicted_salary, single.predicted_salary);
}

#[test]
fn test_range_checks() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::LinearRegression).unwrap();

    let with = |field: &str, value: serde_json::Value| {
        let mut record = valid_record();
        record[field] = value;
        svc.predict_value(&record)
    };

    assert!(with("remote_ratio", json!(0)).is_ok());
    assert!(with("remote_ratio", json!(100)).is_ok());
    assert!(matches!(with("remote_ratio", json!(150)), Err(PredictorError::Validation(_))));
    assert!(with("experience_years", json!(0)).is_ok());
    assert!(matches!(with("experience_years", json!(-1)), Err(PredictorError::Validation(_))));
}

#[test]
fn test_unseen_category_still_predicts() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    svc.load(ModelVariant::RandomForest).unwrap();

    let mut record = valid_record();
    record["education_level"] = json!("Apprenticeship");
    record["job_title"] = json!("Astronaut");
    assert!(svc.predict_value(&record).unwrap().predicted_salary.is_finite());
}

#[test]
fn test_loading_unknown_or_missing_variant_leaves_service_unloaded() {
    let (_dir, config) = trained();
    let mut svc = service(&config);

    let err = svc.load_by_name("deep_neural_net").unwrap_err();
    assert!(matches!(err, PredictorError::ModelLoad { .. }));
    assert!(matches!(svc.state(), ServiceState::Unloaded));

    let empty = tempfile::tempdir().unwrap();
    let mut bare = InferenceService::from_models_dir(empty.path()).unwrap();
    let err = bare.load(ModelVariant::RandomForest).unwrap_err();
    match err {
        PredictorError::ModelLoad { source, .. } => {
            assert!(matches!(*source, PredictorError::ArtifactNotFound { .. }));
        }
        other => panic!("expected model load error, got {other:?}"),
    }
    assert!(!bare.is_loaded());
}

#[test]
fn test_failed_reload_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let report = TrainingPipeline::new(config.clone())
        .run_on_frame(&salary_frame(80))
        .unwrap();
    let best = report.training.unwrap().best.unwrap().variant;

    let mut svc = service(&config);
    svc.load(best).unwrap();

    // Only improvements are persisted, so some variant is missing on disk
    let stored = salary_predictor::artifacts::ArtifactStore::open(&config.data.models_dir)
        .unwrap()
        .list_models(&report.generation)
        .unwrap();
    if let Some(missing) = ModelVariant::ALL.into_iter().find(|v| !stored.contains(v)) {
        assert!(svc.load(missing).is_err());
        assert_eq!(svc.loaded_variant(), Some(best));
    }
}

#[test]
fn test_predictions_require_a_loaded_model() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    assert!(matches!(svc.predict_value(&valid_record()), Err(PredictorError::NotLoaded)));

    svc.load(ModelVariant::RandomForest).unwrap();
    svc.unload();
    assert!(matches!(svc.predict_value(&valid_record()), Err(PredictorError::NotLoaded)));
}

#[test]
fn test_model_info_reflects_loaded_bundle() {
    let (_dir, config) = trained();
    let mut svc = service(&config);
    assert!(!svc.model_info().model_loaded);

    svc.load(ModelVariant::RandomForest).unwrap();
    let info = svc.model_info();
    assert!(info.model_loaded);
    assert_eq!(info.loaded_model, Some(ModelVariant::RandomForest));
    assert_eq!(info.feature_columns.len(), 7);
    assert!(info.available_encoders.contains(&"education_level".to_string()));
    assert!(info.model_info.is_some());
    assert_eq!(info.generation, info.model_info.map(|p| p.generation));
}
