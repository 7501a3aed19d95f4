//! Pipeline configuration
//!
//! Defaults mirror the values the salary models were tuned with. At process
//! start they are overlaid by environment variables, and optionally by a typed
//! override document whose unknown keys are rejected.

use crate::error::{PredictorError, Result};
use crate::preprocessing::OutlierMethod;
use crate::training::ModelVariant;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Data locations, feature lists and cleaning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub raw_data_path: PathBuf,
    pub processed_data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub categorical_features: Vec<String>,
    pub numerical_features: Vec<String>,
    pub target_column: String,
    pub outlier_method: OutlierMethod,
    pub outlier_threshold: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("data/salary_dataset.csv"),
            processed_data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            categorical_features: [
                "company_name",
                "job_title",
                "job_location",
                "education_level",
                "company_size",
                "employment_type",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            numerical_features: ["experience_years", "remote_ratio", "work_year"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            target_column: "salary".to_string(),
            outlier_method: OutlierMethod::Iqr,
            outlier_threshold: 1.5,
        }
    }
}

impl DataConfig {
    /// Fail if the raw dataset is not on disk.
    pub fn check_raw_data(&self) -> Result<()> {
        if !self.raw_data_path.exists() {
            return Err(PredictorError::Config(format!(
                "Raw data file not found: {}",
                self.raw_data_path.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(15),
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub ridge_alpha: f64,
    pub lasso_alpha: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            ridge_alpha: 1.0,
            lasso_alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorParams {
    pub c: f64,
    pub epsilon: f64,
    pub max_iter: usize,
    /// Upper bound on training rows; the kernel matrix is n x n.
    pub max_samples: usize,
}

impl Default for SupportVectorParams {
    fn default() -> Self {
        Self {
            c: 100.0,
            epsilon: 0.1,
            max_iter: 200,
            max_samples: 10_000,
        }
    }
}

/// Model hyperparameters and split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub test_size: f64,
    pub random_state: u64,
    pub random_forest: RandomForestParams,
    pub gradient_boosting: GradientBoostingParams,
    pub linear: LinearParams,
    pub support_vector: SupportVectorParams,
    /// Persist every successfully trained variant, not only improvements.
    pub persist_all_variants: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            random_forest: RandomForestParams::default(),
            gradient_boosting: GradientBoostingParams::default(),
            linear: LinearParams::default(),
            support_vector: SupportVectorParams::default(),
            persist_all_variants: false,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub default_model: String,
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: true,
            default_model: ModelVariant::RandomForest.as_str().to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub api: ApiConfig,
}

/// Deployment environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PredictorError::Config(format!("Unknown environment: {}", other))),
        }
    }
}

impl Environment {
    pub fn overrides(self) -> ConfigOverrides {
        let (debug, log_level) = match self {
            Environment::Development => (true, "debug"),
            Environment::Production => (false, "info"),
        };
        ConfigOverrides {
            api: Some(ApiOverrides {
                debug: Some(debug),
                log_level: Some(log_level.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataOverrides {
    pub raw_data_path: Option<PathBuf>,
    pub processed_data_dir: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub categorical_features: Option<Vec<String>>,
    pub numerical_features: Option<Vec<String>>,
    pub target_column: Option<String>,
    pub outlier_method: Option<OutlierMethod>,
    pub outlier_threshold: Option<f64>,
}

/// `null` becomes `Some(None)` so an override can clear an optional value.
fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomForestOverrides {
    pub n_estimators: Option<usize>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub max_depth: Option<Option<usize>>,
    pub min_samples_split: Option<usize>,
    pub min_samples_leaf: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradientBoostingOverrides {
    pub n_estimators: Option<usize>,
    pub learning_rate: Option<f64>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearOverrides {
    pub ridge_alpha: Option<f64>,
    pub lasso_alpha: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportVectorOverrides {
    pub c: Option<f64>,
    pub epsilon: Option<f64>,
    pub max_iter: Option<usize>,
    pub max_samples: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverrides {
    pub test_size: Option<f64>,
    pub random_state: Option<u64>,
    pub random_forest: Option<RandomForestOverrides>,
    pub gradient_boosting: Option<GradientBoostingOverrides>,
    pub linear: Option<LinearOverrides>,
    pub support_vector: Option<SupportVectorOverrides>,
    pub persist_all_variants: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: Option<bool>,
    pub default_model: Option<String>,
    pub log_level: Option<String>,
}

/// Partial configuration applied on top of an [`AppConfig`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub data: Option<DataOverrides>,
    pub model: Option<ModelOverrides>,
    pub api: Option<ApiOverrides>,
}

impl ConfigOverrides {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PredictorError::Config(format!("Invalid configuration overrides: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl AppConfig {
    /// Defaults overlaid by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
            raw.trim().parse::<T>().map_err(|_| {
                PredictorError::Config(format!("Invalid value for {}: {:?}", key, raw))
            })
        }

        if let Some(v) = lookup("RAW_DATA_PATH") {
            self.data.raw_data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MODELS_DIR") {
            self.data.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("OUTLIER_METHOD") {
            self.data.outlier_method = v.parse()?;
        }
        if let Some(v) = lookup("OUTLIER_THRESHOLD") {
            self.data.outlier_threshold = parse("OUTLIER_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("TEST_SIZE") {
            self.model.test_size = parse("TEST_SIZE", &v)?;
        }
        if let Some(v) = lookup("RANDOM_STATE") {
            self.model.random_state = parse("RANDOM_STATE", &v)?;
        }
        if let Some(v) = lookup("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = lookup("API_PORT") {
            self.api.port = parse("API_PORT", &v)?;
        }
        if let Some(v) = lookup("API_DEBUG") {
            self.api.debug = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("DEFAULT_MODEL") {
            self.api.default_model = v;
        }
        Ok(())
    }

    /// Apply every field present in `overrides`.
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(d) = overrides.data {
            set(&mut self.data.raw_data_path, d.raw_data_path);
            set(&mut self.data.processed_data_dir, d.processed_data_dir);
            set(&mut self.data.models_dir, d.models_dir);
            set(&mut self.data.categorical_features, d.categorical_features);
            set(&mut self.data.numerical_features, d.numerical_features);
            set(&mut self.data.target_column, d.target_column);
            set(&mut self.data.outlier_method, d.outlier_method);
            set(&mut self.data.outlier_threshold, d.outlier_threshold);
        }
        if let Some(m) = overrides.model {
            set(&mut self.model.test_size, m.test_size);
            set(&mut self.model.random_state, m.random_state);
            set(&mut self.model.persist_all_variants, m.persist_all_variants);
            if let Some(rf) = m.random_forest {
                let target = &mut self.model.random_forest;
                set(&mut target.n_estimators, rf.n_estimators);
                set(&mut target.max_depth, rf.max_depth);
                set(&mut target.min_samples_split, rf.min_samples_split);
                set(&mut target.min_samples_leaf, rf.min_samples_leaf);
            }
            if let Some(gb) = m.gradient_boosting {
                let target = &mut self.model.gradient_boosting;
                set(&mut target.n_estimators, gb.n_estimators);
                set(&mut target.learning_rate, gb.learning_rate);
                set(&mut target.max_depth, gb.max_depth);
            }
            if let Some(linear) = m.linear {
                set(&mut self.model.linear.ridge_alpha, linear.ridge_alpha);
                set(&mut self.model.linear.lasso_alpha, linear.lasso_alpha);
            }
            if let Some(svr) = m.support_vector {
                let target = &mut self.model.support_vector;
                set(&mut target.c, svr.c);
                set(&mut target.epsilon, svr.epsilon);
                set(&mut target.max_iter, svr.max_iter);
                set(&mut target.max_samples, svr.max_samples);
            }
        }
        if let Some(a) = overrides.api {
            set(&mut self.api.host, a.host);
            set(&mut self.api.port, a.port);
            set(&mut self.api.debug, a.debug);
            set(&mut self.api.default_model, a.default_model);
            set(&mut self.api.log_level, a.log_level);
        }
    }

    /// Builder-style variant of [`AppConfig::merge`]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.merge(overrides);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.model.test_size > 0.0 && self.model.test_size < 1.0) {
            return Err(PredictorError::Config(format!(
                "Invalid test_size: {}",
                self.model.test_size
            )));
        }
        if self.api.port < 1024 {
            return Err(PredictorError::Config(format!(
                "Invalid port number: {}",
                self.api.port
            )));
        }
        if !(self.data.outlier_threshold > 0.0) {
            return Err(PredictorError::Config(format!(
                "Invalid outlier_threshold: {}",
                self.data.outlier_threshold
            )));
        }
        self.api.default_model.parse::<ModelVariant>()?;
        Ok(())
    }

    /// Create the data, models and logs directories.
    pub fn create_directories(&self) -> Result<()> {
        for dir in [
            self.data.processed_data_dir.as_path(),
            self.data.models_dir.as_path(),
            Path::new("logs"),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
