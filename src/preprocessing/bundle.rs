//! Preprocessing Bundle: encoders, scaler and the canonical feature order
//!
//! A bundle is fitted once on training data and reused unchanged at
//! inference time. `transform` and `transform_records` never refit.

use super::encoder::LabelEncoder;
use super::scaler::StandardScaler;
use super::Record;
use crate::error::{PredictorError, Result};
use crate::utils::column_values;
use ndarray::Array2;
use polars::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Candidate feature columns in priority order.
pub const FEATURE_CANDIDATES: [&str; 9] = [
    "experience_years",
    "education_level",
    "remote_ratio",
    "company_size",
    "employment_type",
    "work_year",
    "company_name",
    "job_title",
    "job_location",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessingBundle {
    encoders: BTreeMap<String, LabelEncoder>,
    scaler: Option<StandardScaler>,
    feature_columns: Vec<String>,
}

impl PreprocessingBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a bundle from persisted parts.
    pub fn from_parts(
        encoders: BTreeMap<String, LabelEncoder>,
        scaler: StandardScaler,
        feature_columns: Vec<String>,
    ) -> Result<Self> {
        if scaler.n_features() != feature_columns.len() {
            return Err(PredictorError::Shape {
                expected: format!("{} scaler features", feature_columns.len()),
                actual: format!("{} scaler features", scaler.n_features()),
            });
        }
        Ok(Self {
            encoders,
            scaler: Some(scaler),
            feature_columns,
        })
    }

    /// Fit encoders and scaler on the same table.
    pub fn fit(&mut self, df: &DataFrame, categorical_features: &[String]) -> Result<()> {
        self.fit_encoders(df, categorical_features)?;
        let encoded = self.encode_frame(df)?;
        self.fit_scaler(&encoded)
    }

    /// Fit one label encoder per categorical feature present in `df` and fix
    /// the feature column order.
    pub fn fit_encoders(&mut self, df: &DataFrame, categorical_features: &[String]) -> Result<()> {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut encoders = BTreeMap::new();
        for name in categorical_features.iter().filter(|c| present.contains(*c)) {
            let column = df.column(name)?.cast(&DataType::String)?;
            let values = column.as_materialized_series().str()?;
            let encoder = LabelEncoder::fit(values.into_iter().flatten())?;
            debug!(feature = %name, classes = encoder.classes().len(), "Fitted label encoder");
            encoders.insert(name.clone(), encoder);
        }

        let feature_columns: Vec<String> = FEATURE_CANDIDATES
            .iter()
            .filter(|c| present.iter().any(|p| p == *c))
            .map(|c| c.to_string())
            .collect();

        if feature_columns.is_empty() {
            return Err(PredictorError::Data(
                "No candidate feature columns present in the dataset".to_string(),
            ));
        }

        self.encoders = encoders;
        self.feature_columns = feature_columns;
        self.scaler = None;
        Ok(())
    }

    /// Encode the feature columns of `df` into an unscaled matrix.
    pub fn encode_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if self.feature_columns.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }

        let columns: Vec<Vec<f64>> = self
            .feature_columns
            .iter()
            .map(|name| -> Result<Vec<f64>> {
                let Some(encoder) = self.encoders.get(name) else {
                    return column_values(df, name);
                };
                let column = df
                    .column(name)
                    .map_err(|_| PredictorError::MissingFeature(name.clone()))?
                    .cast(&DataType::String)?;
                let values = column.as_materialized_series().str()?;
                Ok(values
                    .into_iter()
                    .map(|v| v.map_or(0, |s| encoder.encode(s)) as f64)
                    .collect())
            })
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn(
            (df.height(), columns.len()),
            |(r, c)| columns[c][r],
        ))
    }

    pub fn fit_scaler(&mut self, encoded: &Array2<f64>) -> Result<()> {
        if encoded.ncols() != self.feature_columns.len() {
            return Err(PredictorError::Shape {
                expected: format!("{} features", self.feature_columns.len()),
                actual: format!("{} features", encoded.ncols()),
            });
        }
        self.scaler = Some(StandardScaler::fit(encoded)?);
        Ok(())
    }

    /// Scale an already encoded matrix.
    pub fn scale(&self, encoded: &Array2<f64>) -> Result<Array2<f64>> {
        self.scaler
            .as_ref()
            .ok_or(PredictorError::ModelNotFitted)?
            .transform(encoded)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.scale(&self.encode_frame(df)?)
    }

    /// Encode and scale JSON records in feature column order.
    ///
    /// An absent categorical feature takes the fallback class. An absent
    /// numeric feature is an error.
    pub fn transform_records(&self, records: &[Record]) -> Result<Array2<f64>> {
        if self.feature_columns.is_empty() {
            return Err(PredictorError::ModelNotFitted);
        }

        let n_cols = self.feature_columns.len();
        let mut encoded = Array2::<f64>::zeros((records.len(), n_cols));

        for (r, record) in records.iter().enumerate() {
            for (c, name) in self.feature_columns.iter().enumerate() {
                let value = record.get(name).filter(|v| !v.is_null());
                encoded[[r, c]] = match (self.encoders.get(name), value) {
                    (Some(encoder), Some(v)) => encoder.encode_json(v) as f64,
                    (Some(_), None) => 0.0,
                    (None, Some(v)) => numeric_value(name, v)?,
                    (None, None) => return Err(PredictorError::MissingFeature(name.clone())),
                };
            }
        }

        self.scale(&encoded)
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn encoders(&self) -> &BTreeMap<String, LabelEncoder> {
        &self.encoders
    }

    pub fn available_encoders(&self) -> Vec<String> {
        self.encoders.keys().cloned().collect()
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }
}

fn numeric_value(name: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.ok_or_else(|| {
        PredictorError::InvalidInput(format!("Feature '{}' must be numeric, got {}", name, value))
    })
}
