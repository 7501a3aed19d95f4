//! Dataset cleaning: duplicates, nulls and target outliers

use super::outlier::{compute_bounds, OutlierMethod};
use crate::error::{PredictorError, Result};
use crate::utils::column_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Row counts removed by each cleaning step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub duplicates_removed: usize,
    pub nulls_removed: usize,
    pub outliers_removed: usize,
    pub rows_after: usize,
}

/// Drop duplicate rows (first kept), rows with any null, then rows whose
/// target lies outside the outlier bounds.
pub fn clean_dataset(
    df: &DataFrame,
    target_column: &str,
    method: OutlierMethod,
    threshold: f64,
) -> Result<(DataFrame, CleaningReport)> {
    if df.column(target_column).is_err() {
        return Err(PredictorError::MissingFeature(target_column.to_string()));
    }

    let rows_before = df.height();
    let row_keys = row_keys(df)?;

    // Duplicates are judged on the full row, nulls included.
    let mut seen: HashSet<&Vec<Option<String>>> = HashSet::with_capacity(rows_before);
    let dedup_mask: Vec<bool> = row_keys.iter().map(|key| seen.insert(key)).collect();
    let duplicates_removed = dedup_mask.iter().filter(|keep| !**keep).count();

    let null_mask: Vec<bool> = row_keys
        .iter()
        .zip(&dedup_mask)
        .map(|(key, keep)| *keep && key.iter().all(Option::is_some))
        .collect();
    let nulls_removed = rows_before - duplicates_removed - null_mask.iter().filter(|k| **k).count();

    let deduped = df.filter(&BooleanChunked::from_slice("keep".into(), &null_mask))?;

    let target = column_values(&deduped, target_column)?;
    let bounds = compute_bounds(&target, method, threshold);
    let outlier_mask: Vec<bool> = target.iter().map(|v| bounds.contains(*v)).collect();
    let outliers_removed = outlier_mask.iter().filter(|k| !**k).count();

    let cleaned = deduped.filter(&BooleanChunked::from_slice("keep".into(), &outlier_mask))?;

    let report = CleaningReport {
        rows_before,
        duplicates_removed,
        nulls_removed,
        outliers_removed,
        rows_after: cleaned.height(),
    };

    info!(
        rows_before = report.rows_before,
        duplicates = report.duplicates_removed,
        nulls = report.nulls_removed,
        outliers = report.outliers_removed,
        rows_after = report.rows_after,
        lower = bounds.lower,
        upper = bounds.upper,
        "Dataset cleaned"
    );

    Ok((cleaned, report))
}

/// Textual key per row; `None` marks a null cell.
fn row_keys(df: &DataFrame) -> Result<Vec<Vec<Option<String>>>> {
    let mut keys: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(df.width()); df.height()];

    for column in df.get_columns() {
        let as_text = column.cast(&DataType::String)?;
        let ca = as_text.as_materialized_series().str()?;
        for (row, value) in ca.into_iter().enumerate() {
            keys[row].push(value.map(str::to_string));
        }
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "job_title" => [Some("Engineer"), Some("Engineer"), Some("Analyst"), None, Some("Manager"), Some("Analyst"), Some("Engineer")],
            "experience_years" => [3.0, 3.0, 5.0, 2.0, 10.0, 4.0, 6.0],
            "salary" => [60_000.0, 60_000.0, 70_000.0, 55_000.0, 900_000.0, 65_000.0, 75_000.0],
        }
        .unwrap()
    }

    #[test]
    fn test_clean_counts_each_step() {
        let (cleaned, report) = clean_dataset(&sample(), "salary", OutlierMethod::Iqr, 1.5).unwrap();

        assert_eq!(report.rows_before, 7);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.nulls_removed, 1);
        assert_eq!(report.outliers_removed, 1);
        assert_eq!(report.rows_after, 4);
        assert_eq!(cleaned.height(), 4);
    }

    #[test]
    fn test_clean_keeps_first_occurrence_order() {
        let (cleaned, _) = clean_dataset(&sample(), "salary", OutlierMethod::Iqr, 1.5).unwrap();
        let salaries = column_values(&cleaned, "salary").unwrap();
        assert_eq!(salaries, vec![60_000.0, 70_000.0, 65_000.0, 75_000.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let df = df! { "experience_years" => [1.0] }.unwrap();
        let result = clean_dataset(&df, "salary", OutlierMethod::Iqr, 1.5);
        assert!(matches!(result, Err(PredictorError::MissingFeature(_))));
    }
}
