//! End-to-end training run
//!
//! raw CSV -> clean -> encode -> split -> scale -> persist preprocessing ->
//! train every variant with write-through of the best one.

use crate::artifacts::{ArtifactStore, HeldOutSplit};
use crate::config::AppConfig;
use crate::error::{PredictorError, Result};
use crate::evaluation::{X_TEST_FILE, X_TRAIN_FILE, Y_TEST_FILE, Y_TRAIN_FILE};
use crate::preprocessing::{clean_dataset, CleaningReport, PreprocessingBundle, FEATURE_CANDIDATES};
use crate::training::{train_test_split, ModelRegistry, TrainTestSplit, TrainingSummary};
use crate::utils::{array_to_frame, column_values, load_csv, write_csv, Timer};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scaled split plus the bundle that produced it
#[derive(Debug, Clone)]
pub struct ProcessedData {
    pub bundle: PreprocessingBundle,
    pub split: TrainTestSplit,
    pub cleaning: CleaningReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub cleaning: CleaningReport,
    pub feature_columns: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub generation: String,
    /// `None` for a process-only run
    pub training: Option<TrainingSummary>,
    pub elapsed_secs: f64,
}

pub struct TrainingPipeline {
    config: AppConfig,
}

impl TrainingPipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn load_raw(&self) -> Result<DataFrame> {
        self.config.data.check_raw_data()?;
        let df = load_csv(&self.config.data.raw_data_path)?;
        info!(
            path = %self.config.data.raw_data_path.display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded raw dataset"
        );
        Ok(df)
    }

    /// The target and at least one candidate feature must be present.
    pub fn validate_columns(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut errors = Vec::new();
        if !present.contains(&self.config.data.target_column) {
            errors.push(format!(
                "Missing target column: {}",
                self.config.data.target_column
            ));
        }
        if !FEATURE_CANDIDATES.iter().any(|c| present.iter().any(|p| p == c)) {
            errors.push("No candidate feature columns present".to_string());
        }
        if df.height() == 0 {
            errors.push("Dataset is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PredictorError::Validation(errors))
        }
    }

    /// Clean, encode, split and scale. The scaler is fitted on the training
    /// split only.
    pub fn prepare(&self, df: &DataFrame) -> Result<ProcessedData> {
        self.validate_columns(df)?;
        let data = &self.config.data;

        let (cleaned, cleaning) = clean_dataset(
            df,
            &data.target_column,
            data.outlier_method,
            data.outlier_threshold,
        )?;

        let mut bundle = PreprocessingBundle::new();
        bundle.fit_encoders(&cleaned, &data.categorical_features)?;
        let encoded = bundle.encode_frame(&cleaned)?;
        let y = Array1::from_vec(column_values(&cleaned, &data.target_column)?);

        let mut split = train_test_split(
            &encoded,
            &y,
            self.config.model.test_size,
            self.config.model.random_state,
        )?;
        bundle.fit_scaler(&split.x_train)?;
        split.x_train = bundle.scale(&split.x_train)?;
        split.x_test = bundle.scale(&split.x_test)?;

        info!(
            n_train = split.x_train.len_of(Axis(0)),
            n_test = split.x_test.len_of(Axis(0)),
            features = ?bundle.feature_columns(),
            "Prepared training data"
        );

        Ok(ProcessedData {
            bundle,
            split,
            cleaning,
        })
    }

    /// Write the scaled splits as CSV to the processed data directory.
    /// Evaluation reads the generation's own copy from the artifact store.
    pub fn write_processed(&self, processed: &ProcessedData) -> Result<()> {
        let dir = &self.config.data.processed_data_dir;
        let names = processed.bundle.feature_columns();
        let target = &self.config.data.target_column;
        let split = &processed.split;

        write_csv(&mut array_to_frame(&split.x_train, names)?, &dir.join(X_TRAIN_FILE))?;
        write_csv(&mut array_to_frame(&split.x_test, names)?, &dir.join(X_TEST_FILE))?;
        write_csv(&mut target_frame(target, &split.y_train)?, &dir.join(Y_TRAIN_FILE))?;
        write_csv(&mut target_frame(target, &split.y_test)?, &dir.join(Y_TEST_FILE))?;

        info!(dir = %dir.display(), "Saved processed data");
        Ok(())
    }

    fn process_frame(&self, df: &DataFrame, store: &mut ArtifactStore) -> Result<(ProcessedData, String)> {
        let processed = self.prepare(df)?;
        self.write_processed(&processed)?;
        let generation = store.begin_generation();
        store.save_preprocessing(&processed.bundle)?;
        store.save_test_split(&HeldOutSplit {
            x_test: processed.split.x_test.clone(),
            y_test: processed.split.y_test.clone(),
        })?;
        Ok((processed, generation))
    }

    /// Preprocess and persist without training.
    pub fn process(&self) -> Result<PipelineReport> {
        let df = self.load_raw()?;
        self.process_only(&df)
    }

    pub fn process_only(&self, df: &DataFrame) -> Result<PipelineReport> {
        let timer = Timer::start();
        let mut store = ArtifactStore::open(&self.config.data.models_dir)?;
        let (processed, generation) = self.process_frame(df, &mut store)?;
        Ok(report(processed, generation, None, timer.elapsed_secs()))
    }

    /// Full run from the configured raw CSV.
    pub fn run(&self) -> Result<PipelineReport> {
        let df = self.load_raw()?;
        self.run_on_frame(&df)
    }

    pub fn run_on_frame(&self, df: &DataFrame) -> Result<PipelineReport> {
        let timer = Timer::start();
        let mut store = ArtifactStore::open(&self.config.data.models_dir)?;
        let (processed, generation) = self.process_frame(df, &mut store)?;

        let mut registry = ModelRegistry::with_defaults(&self.config.model);
        let summary = registry.train_all(&processed.split, Some(&store))?;

        let elapsed = timer.elapsed_secs();
        info!(
            generation = %generation,
            trained = summary.n_trained(),
            failed = summary.n_failed(),
            elapsed_secs = elapsed,
            "Training pipeline finished"
        );
        Ok(report(processed, generation, Some(summary), elapsed))
    }
}

fn report(
    processed: ProcessedData,
    generation: String,
    training: Option<TrainingSummary>,
    elapsed_secs: f64,
) -> PipelineReport {
    PipelineReport {
        n_train: processed.split.x_train.nrows(),
        n_test: processed.split.x_test.nrows(),
        feature_columns: processed.bundle.feature_columns().to_vec(),
        cleaning: processed.cleaning,
        generation,
        training,
        elapsed_secs,
    }
}

fn target_frame(name: &str, y: &Array1<f64>) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![Column::new(name.into(), y.to_vec())])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> TrainingPipeline {
        TrainingPipeline::new(AppConfig::default())
    }

    #[test]
    fn test_validate_columns_reports_all_problems() {
        let df = df! { "unrelated" => [1.0, 2.0] }.unwrap();
        match pipeline().validate_columns(&df) {
            Err(PredictorError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prepare_scales_train_split_only() {
        let n = 40;
        let df = df! {
            "experience_years" => (0..n).map(|i| (i % 20) as f64).collect::<Vec<_>>(),
            "education_level" => (0..n).map(|i| ["Bachelor", "Master", "PhD"][i % 3]).collect::<Vec<_>>(),
            "remote_ratio" => (0..n).map(|i| [0i64, 50, 100][i % 3]).collect::<Vec<_>>(),
            "salary" => (0..n).map(|i| 50_000.0 + 1_000.0 * i as f64).collect::<Vec<_>>(),
        }
        .unwrap();

        let processed = pipeline().prepare(&df).unwrap();
        assert_eq!(processed.split.x_test.nrows(), 8);
        assert_eq!(processed.split.x_train.nrows(), 32);
        assert_eq!(
            processed.bundle.feature_columns(),
            &["experience_years", "education_level", "remote_ratio"]
        );

        let means = processed.split.x_train.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-9));
    }
}
