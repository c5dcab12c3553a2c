//! CSV loading into dense `f64` matrices

use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Reads headered, all-numeric CSV files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: usize,
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            separator: b',',
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file as a DataFrame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ModelError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| ModelError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Load a CSV file straight into a row-major matrix
    pub fn load_matrix(&self, path: impl AsRef<Path>) -> Result<Array2<f64>> {
        let df = self.load_csv(path)?;
        dataframe_to_array2(&df)
    }
}

/// Every column of `df` as a row-major `Array2<f64>`.
///
/// Columns are cast to Float64; a null or unparseable cell is an error rather
/// than a silently imputed value.
pub fn dataframe_to_array2(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let cast = column
                .cast(&DataType::Float64)
                .map_err(|e| ModelError::DataError(format!("column '{}': {}", name, e)))?;
            if cast.null_count() > 0 {
                return Err(ModelError::DataError(format!(
                    "column '{}' has {} missing or non-numeric values",
                    name,
                    cast.null_count()
                )));
            }
            let values: Vec<f64> = cast.f64()?.into_no_null_iter().collect();
            Ok(values)
        })
        .collect::<Result<Vec<_>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]))
}

/// Write a single `prediction` column (optionally next to the true target) as CSV
pub fn save_predictions(
    path: impl AsRef<Path>,
    predictions: &Array1<f64>,
    actual: Option<&Array1<f64>>,
) -> Result<()> {
    let mut columns = Vec::with_capacity(2);
    if let Some(y) = actual {
        columns.push(Column::new("actual".into(), y.to_vec()));
    }
    columns.push(Column::new("prediction".into(), predictions.to_vec()));
    let mut df = DataFrame::new(columns)?;

    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "data.csv", "a,b,y\n1,2.5,3\n4,5,6.5\n");

        let m = DataLoader::new().load_matrix(&path).unwrap();
        assert_eq!(m.shape(), &[2, 3]);
        assert_eq!(m[[0, 1]], 2.5);
        assert_eq!(m[[1, 0]], 4.0);
        assert_eq!(m[[1, 2]], 6.5);
    }

    #[test]
    fn test_missing_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "gaps.csv", "a,y\n1,2\n,3\n");
        let err = DataLoader::new().load_matrix(&path).unwrap_err();
        assert!(matches!(err, ModelError::DataError(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(DataLoader::new().load_csv("/nonexistent/data.csv").is_err());
    }

    #[test]
    fn test_save_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/preds.csv");
        let preds = Array1::from_vec(vec![1.5, 2.5]);
        save_predictions(&path, &preds, None).unwrap();

        let back = DataLoader::new().load_matrix(&path).unwrap();
        assert_eq!(back.shape(), &[2, 1]);
        assert_eq!(back[[1, 0]], 2.5);
    }
}
