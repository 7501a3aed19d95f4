//! Standard (z-score) feature scaling

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Column-wise `(x - mean) / std` with population variance.
///
/// Zero-variance columns get a scale of 1.0 so they map to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    n_samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(PredictorError::InvalidInput(
                "Cannot fit a scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PredictorError::Computation("mean of empty axis".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        Ok(Self {
            mean,
            scale,
            n_samples_seen: x.nrows(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok((x - &self.mean) / &self.scale)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(PredictorError::Shape {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}
