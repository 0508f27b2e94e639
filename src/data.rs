//! # Data Loading and Validation Module
//!
//! This module is the exclusive entry point for the training dataset. It
//! reads a comma-separated file with one column per symptom indicator plus a
//! label column, validates it, and converts it into the `ndarray` structures
//! the trainer consumes.
//!
//! - Canonical feature order: every column except the label column is a
//!   feature, in the exact order it appears in the file. That order is
//!   recorded verbatim and becomes the inference-time alignment contract.
//! - User-centric errors: failures are assumed to be user-input errors. The
//!   `DataError` enum is designed to provide clear, actionable feedback.

use ndarray::{Array2, ShapeBuilder, ShapeError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A container for validated data ready for model training.
#[derive(Debug)]
pub struct TrainingData {
    /// Symptom indicator matrix, shape `[n_samples, n_features]`.
    pub x: Array2<f64>,
    /// Raw disease-name label per row, aligned with the rows of `x`.
    pub labels: Vec<String>,
    /// Feature column names in file order. This order is the canonical
    /// feature order for the lifetime of the trained artifact.
    pub feature_names: Vec<String>,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to open data file '{path}': {source}")]
    FileOpen {
        path: String,
        source: std::io::Error,
    },
    #[error(
        "The label column '{column}' was not found in the input file. Available columns: {available:?}"
    )]
    LabelColumnNotFound {
        column: String,
        available: Vec<String>,
    },
    #[error("The input file contains no data rows.")]
    NoRows,
    #[error("The input file has no feature columns besides the label column '{0}'.")]
    NoFeatureColumns(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Internal error: feature columns produced inconsistent dimensions: {0}")]
    ShapeError(#[from] ShapeError),
}

/// Loads and validates the labeled training dataset.
///
/// Every column except `label_column` is treated as a numeric feature; the
/// file's column order is preserved verbatim in `feature_names`.
pub fn load_training_data(path: &str, label_column: &str) -> Result<TrainingData, DataError> {
    let file = File::open(Path::new(path)).map_err(|e| DataError::FileOpen {
        path: path.to_string(),
        source: e,
    })?;

    let df = CsvReader::new(file)
        .with_options(CsvReadOptions::default().with_has_header(true))
        .finish()?;

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    if !column_names.iter().any(|c| c == label_column) {
        return Err(DataError::LabelColumnNotFound {
            column: label_column.to_string(),
            available: column_names,
        });
    }

    if df.height() == 0 {
        return Err(DataError::NoRows);
    }

    let feature_names: Vec<String> = column_names
        .iter()
        .filter(|c| c.as_str() != label_column)
        .cloned()
        .collect();
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns(label_column.to_string()));
    }

    let labels = extract_label_column(&df, label_column)?;

    let n_samples = df.height();
    let n_features = feature_names.len();
    let mut buffer = Vec::with_capacity(n_samples * n_features);
    for name in &feature_names {
        let mut column = extract_numeric_column(&df, name)?;
        buffer.append(&mut column);
    }
    // Columns were appended one after another, so the buffer is in
    // column-major (Fortran) order.
    let x = Array2::from_shape_vec((n_samples, n_features).f(), buffer)?;

    log::info!(
        "Loaded {} samples with {} feature columns from '{}'",
        n_samples,
        n_features,
        path
    );

    Ok(TrainingData {
        x,
        labels,
        feature_names,
    })
}

/// Extracts a feature column as finite `f64` values, in row order.
fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|&v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

/// Extracts the label column as strings, in row order.
fn extract_label_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::String) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "string",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    let chunked = casted.str()?.rechunk();
    Ok(chunked.into_no_null_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_training_data_success() {
        let content = "fever,cough,fatigue,Disease_name\n\
                       1,1,0,Flu\n\
                       0,1,0,Cold\n\
                       0,0,1,Allergy";
        let file = create_test_csv(content).unwrap();
        let data = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap();

        assert_eq!(data.x.shape(), &[3, 3]);
        assert_eq!(data.feature_names, vec!["fever", "cough", "fatigue"]);
        assert_eq!(data.labels, vec!["Flu", "Cold", "Allergy"]);
        assert_abs_diff_eq!(data.x[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.x[[0, 2]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.x[[2, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_feature_order_is_file_order() {
        // Deliberately not alphabetical: the file order must survive verbatim.
        let content = "zoster_rash,abdominal_pain,mild_fever,Disease_name\n\
                       1,0,0,A\n\
                       0,1,0,B";
        let file = create_test_csv(content).unwrap();
        let data = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap();
        assert_eq!(
            data.feature_names,
            vec!["zoster_rash", "abdominal_pain", "mild_fever"]
        );
    }

    #[test]
    fn test_label_column_position_does_not_matter() {
        let content = "fever,Disease_name,cough\n\
                       1,Flu,1\n\
                       0,Cold,1";
        let file = create_test_csv(content).unwrap();
        let data = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap();
        assert_eq!(data.feature_names, vec!["fever", "cough"]);
        assert_eq!(data.x.shape(), &[2, 2]);
        assert_abs_diff_eq!(data.x[[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_error_missing_file() {
        let err = load_training_data("/nonexistent/model.csv", "Disease_name").unwrap_err();
        match err {
            DataError::FileOpen { path, .. } => assert_eq!(path, "/nonexistent/model.csv"),
            other => panic!("Expected FileOpen, got {other:?}"),
        }
    }

    #[test]
    fn test_error_missing_label_column() {
        let content = "fever,cough\n1,0\n0,1";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::LabelColumnNotFound { column, available } => {
                assert_eq!(column, "Disease_name");
                assert_eq!(available, vec!["fever", "cough"]);
            }
            other => panic!("Expected LabelColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_error_zero_rows() {
        let content = "fever,cough,Disease_name";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::NoRows => {}
            other => panic!("Expected NoRows, got {other:?}"),
        }
    }

    #[test]
    fn test_error_no_feature_columns() {
        let content = "Disease_name\nFlu\nCold";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::NoFeatureColumns(column) => assert_eq!(column, "Disease_name"),
            other => panic!("Expected NoFeatureColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_error_non_numeric_feature() {
        let content = "fever,cough,Disease_name\n1,yes,Flu\n0,no,Cold";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::ColumnWrongType { column_name, .. } => assert_eq!(column_name, "cough"),
            other => panic!("Expected ColumnWrongType, got {other:?}"),
        }
    }

    #[test]
    fn test_error_non_finite_feature() {
        let content = "fever,cough,Disease_name\n1,NaN,Flu\n0,1,Cold";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::NonFiniteValuesFound(column) => assert_eq!(column, "cough"),
            other => panic!("Expected NonFiniteValuesFound, got {other:?}"),
        }
    }

    #[test]
    fn test_error_missing_feature_value() {
        let content = "fever,cough,Disease_name\n1,,Flu\n0,1,Cold";
        let file = create_test_csv(content).unwrap();
        let err = load_training_data(file.path().to_str().unwrap(), "Disease_name").unwrap_err();
        match err {
            DataError::MissingValuesFound(column) => assert_eq!(column, "cough"),
            other => panic!("Expected MissingValuesFound, got {other:?}"),
        }
    }
}
