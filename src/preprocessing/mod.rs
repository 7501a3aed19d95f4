//! Data preprocessing
//!
//! - Dataset cleaning (duplicates, nulls, target outliers)
//! - Label encoding of categorical features
//! - Standard scaling
//! - The Preprocessing Bundle tying them to a fixed feature order

mod bundle;
mod cleaning;
mod encoder;
pub mod outlier;
mod scaler;

pub use bundle::{PreprocessingBundle, FEATURE_CANDIDATES};
pub use cleaning::{clean_dataset, CleaningReport};
pub use encoder::LabelEncoder;
pub use outlier::{compute_bounds, OutlierBounds, OutlierMethod};
pub use scaler::StandardScaler;

/// One input record: feature name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
