//! Descriptive statistics over numeric columns

use serde::{Deserialize, Serialize};

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    if values.len() <= ddof {
        return 0.0;
    }
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    (ss / (values.len() - ddof) as f64).sqrt()
}

/// Summary statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl ColumnStatistics {
    /// Returns `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = values.len() as f64;
        let m = mean(values);
        let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
        let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
        let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;

        // Adjusted Fisher-Pearson skewness and bias-corrected excess kurtosis
        let skewness = if values.len() > 2 && m2 > 0.0 {
            let g1 = m3 / m2.powf(1.5);
            g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
        } else {
            0.0
        };
        let kurtosis = if values.len() > 3 && m2 > 0.0 {
            let g2 = m4 / (m2 * m2) - 3.0;
            ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
        } else {
            0.0
        };

        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);

        Some(Self {
            count: values.len(),
            mean: m,
            median: quantile_sorted(&sorted, 0.5),
            std: std_dev(values, 1),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            q1,
            q3,
            iqr: q3 - q1,
            skewness,
            kurtosis,
        })
    }
}
