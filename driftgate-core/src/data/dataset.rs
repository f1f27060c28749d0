//! In-memory tabular dataset loaded from a CSV file.

use crate::data::schema::{ColumnType, infer_column_type, is_missing};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::persistence::atomic_write_with;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Which half of the split a dataset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Train,
    Test,
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Test => f.write_str("test"),
        }
    }
}

/// Typed view of one column with missing values already removed.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues<'a> {
    Numeric(Vec<f64>),
    Categorical(Vec<&'a str>),
    /// Every cell was a missing-value sentinel.
    Empty,
}

/// A column of a [`Dataset`].
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    dataset: &'a Dataset,
    index: usize,
}

impl<'a> Column<'a> {
    pub fn name(&self) -> &'a str {
        &self.dataset.headers[self.index]
    }

    pub fn dtype(&self) -> ColumnType {
        self.dataset.dtypes[self.index]
    }

    /// Raw cells in row order, including missing sentinels.
    pub fn cells(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        let index = self.index;
        self.dataset
            .rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    pub fn missing_count(&self) -> usize {
        self.cells().filter(|c| is_missing(c)).count()
    }

    /// Non-missing values, typed according to the inferred column type.
    pub fn values(&self) -> ColumnValues<'a> {
        let present = self.cells().filter(|c| !is_missing(c)).map(str::trim);
        match self.dtype() {
            ColumnType::Null | ColumnType::Unknown => ColumnValues::Empty,
            ColumnType::Integer | ColumnType::Float => {
                ColumnValues::Numeric(present.filter_map(|c| c.parse::<f64>().ok()).collect())
            }
            ColumnType::Boolean => ColumnValues::Categorical(
                present
                    .map(|c| if c.eq_ignore_ascii_case("true") { "true" } else { "false" })
                    .collect(),
            ),
            ColumnType::String => ColumnValues::Categorical(present.collect()),
        }
    }
}

/// A table of named columns. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    dtypes: Vec<ColumnType>,
}

impl Dataset {
    /// Build a dataset from headers and raw rows. Column types are inferred.
    pub fn from_rows(
        source: impl Into<PathBuf>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let dtypes = (0..headers.len())
            .map(|i| {
                infer_column_type(rows.iter().map(|r| r.get(i).map(String::as_str).unwrap_or("")))
            })
            .collect();
        Self {
            source: source.into(),
            headers,
            rows,
            dtypes,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn column_names(&self) -> &[String] {
        &self.headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = Column<'_>> {
        (0..self.headers.len()).map(move |index| Column {
            dataset: self,
            index,
        })
    }

    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|index| Column {
                dataset: self,
                index,
            })
    }
}

/// Read a CSV file with a header row into a [`Dataset`].
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let load_err =
        |message: String| ValidationError::new("read_dataset", ErrorKind::load(path, message));

    if !path.is_file() {
        return Err(load_err("file does not exist".to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| load_err(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| load_err(format!("failed to read header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(load_err("missing header row".to_string()));
    }
    let mut seen = HashSet::with_capacity(headers.len());
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(load_err(format!("duplicate column '{dup}' in header row")));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| load_err(format!("malformed record {}: {e}", line + 1)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let dataset = Dataset::from_rows(path, headers, rows);
    tracing::debug!(
        path = %path.display(),
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        missing = dataset.columns().map(|c| c.missing_count()).sum::<usize>(),
        "Loaded dataset"
    );
    Ok(dataset)
}

/// Write `dataset` to `path` as CSV with a header row, atomically.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    atomic_write_with(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&dataset.headers).map_err(io::Error::other)?;
        for row in &dataset.rows {
            writer.write_record(row).map_err(io::Error::other)?;
        }
        writer.flush()
    })
    .map_err(|e| ValidationError::new("write_dataset", ErrorKind::persistence(path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_dataset_infers_types() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "train.csv",
            "age,score,city,flag\n30,1.5,Paris,true\n25,na,Lyon,false\n,2.0,NA,true\n",
        );
        let ds = read_dataset(&path).unwrap();

        assert_eq!(ds.column_count(), 4);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column("age").unwrap().dtype(), ColumnType::Integer);
        assert_eq!(ds.column("score").unwrap().dtype(), ColumnType::Float);
        assert_eq!(ds.column("city").unwrap().dtype(), ColumnType::String);
        assert_eq!(ds.column("flag").unwrap().dtype(), ColumnType::Boolean);
    }

    #[test]
    fn test_missing_values_are_normalised() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "d.csv", "x,y\n1,a\nNaN,null\n3,\nnull,b\n");
        let ds = read_dataset(&path).unwrap();

        let x = ds.column("x").unwrap();
        assert_eq!(x.missing_count(), 2);
        assert_eq!(x.values(), ColumnValues::Numeric(vec![1.0, 3.0]));

        let y = ds.column("y").unwrap();
        assert_eq!(y.missing_count(), 2);
        assert_eq!(y.values(), ColumnValues::Categorical(vec!["a", "b"]));
    }

    #[test]
    fn test_all_missing_column_is_empty() {
        let ds = Dataset::from_rows(
            "mem",
            vec!["x".into()],
            vec![vec!["na".into()], vec!["".into()]],
        );
        assert_eq!(ds.column("x").unwrap().dtype(), ColumnType::Null);
        assert_eq!(ds.column("x").unwrap().values(), ColumnValues::Empty);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_dataset(Path::new("/nonexistent/train.csv")).unwrap_err();
        assert!(err.is_load());
        assert_eq!(err.operation, "read_dataset");
    }

    #[test]
    fn test_read_ragged_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.csv", "a,b\n1,2\n3\n");
        let err = read_dataset(&path).unwrap_err();
        assert!(err.is_load());
        assert!(err.to_string().contains("malformed record 2"));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "dup.csv", "x,y,x\n1,2,3\n");
        let err = read_dataset(&path).unwrap_err();
        assert!(err.is_load());
        assert!(err.to_string().contains("duplicate column 'x'"));
    }

    #[test]
    fn test_write_dataset_preserves_content() {
        let dir = TempDir::new().unwrap();
        let src = write(&dir, "in.csv", "a,b\n1,na\n2,x\n");
        let ds = read_dataset(&src).unwrap();

        let out = dir.path().join("validated").join("train.csv");
        write_dataset(&out, &ds).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a,b\n1,na\n2,x\n");
    }
}
