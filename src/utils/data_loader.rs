//! Data loading utilities

use crate::error::{PredictorError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Load a CSV file with a header row.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| {
        PredictorError::Data(format!("Cannot open {}: {}", path.display(), e))
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()?;

    Ok(df)
}

/// Write a frame to CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Extract one column as `Vec<f64>`.
pub fn column_values(df: &DataFrame, col_name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(col_name)
        .map_err(|_| PredictorError::MissingFeature(col_name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let series = casted.as_materialized_series();

    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PredictorError::Data(format!("Null value in column '{}' at row {}", col_name, row))
            })
        })
        .collect()
}

/// Build a frame from a matrix and its column names.
pub fn array_to_frame(x: &Array2<f64>, names: &[String]) -> Result<DataFrame> {
    if x.ncols() != names.len() {
        return Err(PredictorError::Shape {
            expected: format!("{} columns", names.len()),
            actual: format!("{} columns", x.ncols()),
        });
    }

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| Column::new(name.as_str().into(), x.column(j).to_vec()))
        .collect();

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_column_values_casts_integers() {
        let df = df! { "remote_ratio" => [0i64, 50, 100] }.unwrap();
        assert_eq!(column_values(&df, "remote_ratio").unwrap(), vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn test_missing_column_is_missing_feature() {
        let df = df! { "a" => [1.0] }.unwrap();
        let err = column_values(&df, "z").unwrap_err();
        assert!(matches!(err, PredictorError::MissingFeature(name) if name == "z"));
    }

    #[test]
    fn test_csv_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("train.csv");

        let x = array![[1.5, 2.0], [3.0, -4.25]];
        let names = vec!["experience_years".to_string(), "salary".to_string()];
        let mut df = array_to_frame(&x, &names).unwrap();
        write_csv(&mut df, &path).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(column_values(&loaded, "experience_years").unwrap(), vec![1.5, 3.0]);
        assert_eq!(column_values(&loaded, "salary").unwrap(), vec![2.0, -4.25]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_csv(Path::new("/nonexistent/salary.csv"));
        assert!(matches!(result, Err(PredictorError::Data(_))));
    }
}
