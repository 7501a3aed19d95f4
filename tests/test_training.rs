//! Integration tests for regressors, the train/test split and the model registry

mod common;

use common::{fast_config, salary_frame};
use ndarray::{Array1, Array2};
use salary_predictor::artifacts::ArtifactStore;
use salary_predictor::pipeline::TrainingPipeline;
use salary_predictor::training::{
    shuffle_split, train_test_split, BestModelTracker, ModelRegistry, ModelVariant,
    RegressionMetrics, Regressor, SupportVectorRegressor, SvrConfig, TrainTestSplit, TrainedModel,
    VariantOutcome,
};

fn processed_split() -> TrainTestSplit {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = TrainingPipeline::new(fast_config(dir.path()));
    pipeline.prepare(&salary_frame(80)).unwrap().split
}

// ============================================================================
// Split
// ============================================================================

#[test]
fn test_split_sizes_round_test_share_up() {
    let indices = shuffle_split(81, 0.2, 42).unwrap();
    assert_eq!(indices.test.len(), 17);
    assert_eq!(indices.train.len(), 64);

    let mut all: Vec<usize> = indices.train.iter().chain(&indices.test).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..81).collect::<Vec<_>>());
}

#[test]
fn test_split_is_seeded() {
    let x = Array2::from_shape_fn((30, 2), |(r, c)| (r * 2 + c) as f64);
    let y = Array1::from_iter((0..30).map(|v| v as f64));

    let a = train_test_split(&x, &y, 0.3, 7).unwrap();
    let b = train_test_split(&x, &y, 0.3, 7).unwrap();
    let c = train_test_split(&x, &y, 0.3, 8).unwrap();

    assert_eq!(a.y_test, b.y_test);
    assert_eq!(a.x_train, b.x_train);
    assert_ne!(a.y_test, c.y_test);
}

#[test]
fn test_split_rejects_degenerate_sizes() {
    assert!(shuffle_split(10, 0.0, 1).is_err());
    assert!(shuffle_split(10, 1.0, 1).is_err());
    assert!(shuffle_split(1, 0.5, 1).is_err());
}

// ============================================================================
// Regressors
// ============================================================================

#[test]
fn test_every_variant_fits_the_fixture() {
    let split = processed_split();
    let config = fast_config(std::path::Path::new("."));

    for variant in ModelVariant::ALL {
        let mut model = TrainedModel::from_config(variant, &config.model);
        model.fit(&split.x_train, &split.y_train).unwrap();
        let preds = model.predict(&split.x_test).unwrap();
        assert_eq!(preds.len(), split.y_test.len(), "{}", variant);
        assert!(preds.iter().all(|p| p.is_finite()), "{}", variant);
    }
}

#[test]
fn test_linear_model_recovers_linear_target() {
    let split = processed_split();
    let mut model = TrainedModel::from_config(ModelVariant::LinearRegression, &Default::default());
    model.fit(&split.x_train, &split.y_train).unwrap();

    let metrics = RegressionMetrics::compute(&split.y_test, &model.predict(&split.x_test).unwrap());
    assert!(metrics.r2 > 0.8, "r2 = {}", metrics.r2);
}

#[test]
fn test_only_tree_models_report_importances() {
    let split = processed_split();
    let config = fast_config(std::path::Path::new("."));

    for variant in ModelVariant::ALL {
        let mut model = TrainedModel::from_config(variant, &config.model);
        model.fit(&split.x_train, &split.y_train).unwrap();
        assert_eq!(
            model.feature_importances().is_some(),
            matches!(variant, ModelVariant::RandomForest | ModelVariant::GradientBoosting),
            "{}",
            variant
        );
        assert_eq!(
            model.estimator_predictions(&split.x_test).unwrap().is_some(),
            variant.is_bagged_ensemble(),
            "{}",
            variant
        );
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_best_selection_is_first_to_reach_the_top_score() {
    let mut tracker = BestModelTracker::new();
    for (name, score) in [("a", 0.5), ("b", 0.8), ("c", 0.8), ("d", 0.7)] {
        tracker.observe(name, score);
    }
    assert_eq!(tracker.best(), Some(("b", 0.8)));
}

#[test]
fn test_registry_best_matches_highest_test_r2() {
    let split = processed_split();
    let config = fast_config(std::path::Path::new("."));
    let mut registry = ModelRegistry::with_defaults(&config.model);

    let summary = registry.train_all(&split, None).unwrap();
    assert_eq!(summary.n_trained(), 6);
    assert_eq!(summary.n_failed(), 0);
    assert_eq!(registry.history().len(), 6);

    // Strict improvement in registration order
    let mut expected: Option<(ModelVariant, f64)> = None;
    for outcome in &summary.outcomes {
        if let VariantOutcome::Trained { record, became_best } = outcome {
            let improves = expected.map_or(true, |(_, s)| record.test_r2 > s);
            assert_eq!(*became_best, improves, "{}", record.variant);
            if improves {
                expected = Some((record.variant, record.test_r2));
            }
        }
    }

    let best = summary.best.unwrap();
    assert_eq!(Some((best.variant, best.score)), expected);
    assert_eq!(registry.best().map(|b| b.variant), Some(best.variant));
}

#[test]
fn test_failed_variant_does_not_abort_run() {
    let split = processed_split();
    let config = fast_config(std::path::Path::new("."));
    let ridge_config = config.model.clone();

    let mut registry = ModelRegistry::new();
    registry
        .register(
            ModelVariant::SupportVector,
            Box::new(|| {
                TrainedModel::SupportVector(SupportVectorRegressor::new(SvrConfig {
                    max_samples: 1,
                    ..Default::default()
                }))
            }),
        )
        .unwrap();
    registry
        .register(
            ModelVariant::RidgeRegression,
            Box::new(move || TrainedModel::from_config(ModelVariant::RidgeRegression, &ridge_config)),
        )
        .unwrap();

    let summary = registry.train_all(&split, None).unwrap();
    assert_eq!(summary.n_failed(), 1);
    assert_eq!(summary.n_trained(), 1);
    assert!(!summary.outcomes[0].is_success());
    assert_eq!(summary.best.unwrap().variant, ModelVariant::RidgeRegression);
}

#[test]
fn test_best_artifact_survives_a_later_failure() {
    let dir = tempfile::tempdir().unwrap();
    let split = processed_split();
    let ridge_config = fast_config(dir.path()).model;

    let mut store = ArtifactStore::open(dir.path().join("models")).unwrap();
    let generation = store.begin_generation();

    let mut registry = ModelRegistry::new();
    registry
        .register(
            ModelVariant::RidgeRegression,
            Box::new(move || TrainedModel::from_config(ModelVariant::RidgeRegression, &ridge_config)),
        )
        .unwrap();
    registry
        .register(
            ModelVariant::SupportVector,
            Box::new(|| {
                TrainedModel::SupportVector(SupportVectorRegressor::new(SvrConfig {
                    max_samples: 1,
                    ..Default::default()
                }))
            }),
        )
        .unwrap();

    let summary = registry.train_all(&split, Some(&store)).unwrap();
    assert_eq!(summary.n_trained(), 1);
    assert_eq!(summary.n_failed(), 1);
    assert!(!summary.outcomes[1].is_success());

    let pointer = store.load_best_pointer().unwrap();
    assert_eq!(pointer.best_model, ModelVariant::RidgeRegression);
    assert_eq!(pointer.generation, generation);

    let stored = store.load_model(&generation, ModelVariant::RidgeRegression).unwrap();
    assert_eq!(stored.record.test_r2, pointer.best_score);
    assert_eq!(store.list_models(&generation).unwrap(), vec![ModelVariant::RidgeRegression]);
}

#[test]
fn test_registry_writes_through_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let split = processed_split();
    let config = fast_config(dir.path());

    let mut store = ArtifactStore::open(dir.path().join("models")).unwrap();
    let generation = store.begin_generation();

    let mut registry = ModelRegistry::with_defaults(&config.model);
    let summary = registry.train_all(&split, Some(&store)).unwrap();
    let best = summary.best.unwrap();

    let pointer = store.load_best_pointer().unwrap();
    assert_eq!(pointer.best_model, best.variant);
    assert_eq!(pointer.generation, generation);
    assert_eq!(summary.generation.as_deref(), Some(generation.as_str()));

    let saved = store.list_models(&generation).unwrap();
    assert!(saved.contains(&best.variant));
    assert!(saved.contains(&ModelVariant::LinearRegression));

    let history = store.read_training_history().unwrap();
    assert_eq!(history.len(), 6);
    assert!(history.iter().all(|r| r.generation.as_deref() == Some(generation.as_str())));
}

#[test]
fn test_training_is_deterministic() {
    let split = processed_split();
    let config = fast_config(std::path::Path::new("."));

    let scores = || {
        let mut registry = ModelRegistry::with_defaults(&config.model);
        let summary = registry.train_all(&split, None).unwrap();
        summary
            .outcomes
            .iter()
            .filter_map(|o| match o {
                VariantOutcome::Trained { record, .. } => Some(record.test_r2),
                VariantOutcome::Failed { .. } => None,
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(scores(), scores());
}
