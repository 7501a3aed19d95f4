//! Generation-stamped artifact store
//!
//! Layout under the store root:
//!
//! ```text
//! best_model_info.json
//! training_history.jsonl
//! generations/<generation>/scaler.json
//! generations/<generation>/label_encoders.json
//! generations/<generation>/feature_columns.json
//! generations/<generation>/test_split.json
//! generations/<generation>/models/<variant>_model.json
//! ```
//!
//! Files under a generation are wrapped in an [`Envelope`] naming that
//! generation, and loads refuse envelopes from any other generation. All
//! files are written to a temporary sibling and renamed into place.

use crate::error::{PredictorError, Result};
use crate::preprocessing::{LabelEncoder, PreprocessingBundle, StandardScaler};
use crate::training::{ModelVariant, TrainedModel, TrainingRecord};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const POINTER_FILE: &str = "best_model_info.json";
const HISTORY_FILE: &str = "training_history.jsonl";
const GENERATIONS_DIR: &str = "generations";
const MODELS_DIR: &str = "models";
const SCALER_FILE: &str = "scaler.json";
const ENCODERS_FILE: &str = "label_encoders.json";
const FEATURES_FILE: &str = "feature_columns.json";
const TEST_SPLIT_FILE: &str = "test_split.json";
const MODEL_SUFFIX: &str = "_model.json";

/// Generation-scoped file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub generation: String,
    pub saved_at: DateTime<Utc>,
    pub payload: T,
}

/// A fitted model together with the record of the run that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub record: TrainingRecord,
    pub model: TrainedModel,
}

impl StoredModel {
    pub fn variant(&self) -> ModelVariant {
        self.model.variant()
    }
}

/// Scaled held-out rows of the generation's split, in feature column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldOutSplit {
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// Contents of `best_model_info.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModelPointer {
    pub best_model: ModelVariant,
    pub best_score: f64,
    pub generation: String,
    pub timestamp: DateTime<Utc>,
}

impl BestModelPointer {
    pub fn new(best_model: ModelVariant, best_score: f64, generation: impl Into<String>) -> Self {
        Self {
            best_model,
            best_score,
            generation: generation.into(),
            timestamp: Utc::now(),
        }
    }
}

/// New generation id: UTC timestamp plus a short random suffix.
pub fn new_generation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8])
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    generation: Option<String>,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            generation: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh generation; subsequent saves are stamped with it.
    pub fn begin_generation(&mut self) -> String {
        let id = new_generation_id();
        info!(generation = %id, root = %self.root.display(), "Starting artifact generation");
        self.generation = Some(id.clone());
        id
    }

    /// Use an existing generation for subsequent saves and loads.
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = Some(generation.into());
        self
    }

    pub fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    fn active_generation(&self) -> Result<&str> {
        self.generation
            .as_deref()
            .ok_or_else(|| PredictorError::Config("No active artifact generation".to_string()))
    }

    pub fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(GENERATIONS_DIR).join(generation)
    }

    pub fn model_path(&self, generation: &str, variant: ModelVariant) -> PathBuf {
        self.generation_dir(generation)
            .join(MODELS_DIR)
            .join(format!("{}{}", variant.as_str(), MODEL_SUFFIX))
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.root.join(POINTER_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Persist a fitted model under the active generation.
    pub fn save_model(&self, stored: &StoredModel) -> Result<PathBuf> {
        let generation = self.active_generation()?;
        let path = self.model_path(generation, stored.variant());
        write_envelope(&path, generation, stored)?;
        info!(
            variant = %stored.variant(),
            generation,
            path = %path.display(),
            "Saved model"
        );
        Ok(path)
    }

    pub fn load_model(&self, generation: &str, variant: ModelVariant) -> Result<StoredModel> {
        let path = self.model_path(generation, variant);
        let stored: StoredModel = read_envelope(&path, variant.as_str(), generation)?;
        if stored.variant() != variant {
            return Err(PredictorError::Serialization(format!(
                "{} contains a {} model",
                path.display(),
                stored.variant()
            )));
        }
        Ok(stored)
    }

    /// Persist the encoders, scaler and feature column list under the active
    /// generation.
    pub fn save_preprocessing(&self, bundle: &PreprocessingBundle) -> Result<()> {
        let generation = self.active_generation()?;
        let scaler = bundle.scaler().ok_or(PredictorError::ModelNotFitted)?;
        let dir = self.generation_dir(generation);

        write_envelope(&dir.join(SCALER_FILE), generation, scaler)?;
        write_envelope(&dir.join(ENCODERS_FILE), generation, bundle.encoders())?;
        write_envelope(
            &dir.join(FEATURES_FILE),
            generation,
            bundle.feature_columns(),
        )?;

        info!(
            generation,
            n_features = bundle.feature_columns().len(),
            n_encoders = bundle.encoders().len(),
            "Saved preprocessing artifacts"
        );
        Ok(())
    }

    pub fn load_preprocessing(&self, generation: &str) -> Result<PreprocessingBundle> {
        let dir = self.generation_dir(generation);
        let scaler: StandardScaler = read_envelope(&dir.join(SCALER_FILE), "scaler", generation)?;
        let encoders: BTreeMap<String, LabelEncoder> =
            read_envelope(&dir.join(ENCODERS_FILE), "label_encoders", generation)?;
        let feature_columns: Vec<String> =
            read_envelope(&dir.join(FEATURES_FILE), "feature_columns", generation)?;
        PreprocessingBundle::from_parts(encoders, scaler, feature_columns)
    }

    /// Persist the held-out split scaled by the active generation's bundle.
    pub fn save_test_split(&self, split: &HeldOutSplit) -> Result<()> {
        let generation = self.active_generation()?;
        if split.x_test.nrows() != split.y_test.len() {
            return Err(PredictorError::shape_mismatch(
                split.x_test.nrows(),
                split.y_test.len(),
            ));
        }
        let path = self.generation_dir(generation).join(TEST_SPLIT_FILE);
        write_envelope(&path, generation, split)?;
        debug!(generation, rows = split.y_test.len(), "Saved held-out split");
        Ok(())
    }

    pub fn load_test_split(&self, generation: &str) -> Result<HeldOutSplit> {
        let path = self.generation_dir(generation).join(TEST_SPLIT_FILE);
        read_envelope(&path, "test_split", generation)
    }

    /// Overwrite the best-model pointer. The model it names must already be
    /// on disk.
    pub fn save_best_pointer(&self, pointer: &BestModelPointer) -> Result<()> {
        let model_path = self.model_path(&pointer.generation, pointer.best_model);
        if !model_path.exists() {
            return Err(PredictorError::ArtifactNotFound {
                name: pointer.best_model.to_string(),
                path: model_path,
            });
        }
        write_json_atomic(&self.pointer_path(), pointer)?;
        info!(
            best_model = %pointer.best_model,
            best_score = pointer.best_score,
            generation = %pointer.generation,
            "Updated best model pointer"
        );
        Ok(())
    }

    pub fn load_best_pointer(&self) -> Result<BestModelPointer> {
        let path = self.pointer_path();
        if !path.exists() {
            return Err(PredictorError::ArtifactNotFound {
                name: "best_model_info".to_string(),
                path,
            });
        }
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn append_training_record(&self, record: &TrainingRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path())?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Every record ever appended, oldest first. Empty if nothing was trained.
    pub fn read_training_history(&self) -> Result<Vec<TrainingRecord>> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Variants persisted under `generation`, in registration order.
    pub fn list_models(&self, generation: &str) -> Result<Vec<ModelVariant>> {
        let dir = self.generation_dir(generation).join(MODELS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut variants = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(MODEL_SUFFIX)) else {
                continue;
            };
            match stem.parse::<ModelVariant>() {
                Ok(variant) => variants.push(variant),
                Err(_) => debug!(file = stem, "Skipping unrecognized model file"),
            }
        }
        variants.sort();
        Ok(variants)
    }

    /// Generation named by the best-model pointer.
    pub fn active_generation_on_disk(&self) -> Result<String> {
        Ok(self.load_best_pointer()?.generation)
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_envelope<T: Serialize + ?Sized>(path: &Path, generation: &str, payload: &T) -> Result<()> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a, T: ?Sized> {
        generation: &'a str,
        saved_at: DateTime<Utc>,
        payload: &'a T,
    }

    write_json_atomic(
        path,
        &EnvelopeRef {
            generation,
            saved_at: Utc::now(),
            payload,
        },
    )
}

fn read_envelope<T: DeserializeOwned>(path: &Path, name: &str, generation: &str) -> Result<T> {
    if !path.exists() {
        return Err(PredictorError::ArtifactNotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    let envelope: Envelope<T> = serde_json::from_reader(BufReader::new(file))?;
    if envelope.generation != generation {
        return Err(PredictorError::GenerationMismatch {
            artifact: name.to_string(),
            expected: generation.to_string(),
            found: envelope.generation,
        });
    }
    Ok(envelope.payload)
}
