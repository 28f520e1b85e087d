//! Data loaders for trial CSV files.
//!
//! Trial recordings are loaded as a [`Table`]: the header row plus the raw
//! string cells of every record. Numeric views are parsed on demand so that
//! non-numeric columns survive a load/write cycle untouched.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{0}' is not numeric")]
    NonNumericColumn(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for a CSV table with string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names from the header row.
    pub headers: Vec<String>,
    /// Data rows; every row has exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Returns the number of data rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Parse column `idx` as floats.
    ///
    /// Empty cells become `NaN` (missing). Returns `None` if any non-empty
    /// cell fails to parse, i.e. the column is not numeric.
    pub fn numeric_column(&self, idx: usize) -> Option<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| parse_cell(row.get(idx).map(String::as_str).unwrap_or("")))
            .collect()
    }

    /// True if every cell of column `idx` is an integer literal.
    ///
    /// A blank cell makes the column fractional, since a missing value
    /// cannot be held as an integer.
    pub fn is_integer_column(&self, idx: usize) -> bool {
        self.rows.iter().all(|row| {
            row.get(idx)
                .map(|cell| cell.trim().parse::<i64>().is_ok())
                .unwrap_or(false)
        })
    }

    /// Names of the columns that hold at least one non-numeric cell.
    pub fn non_numeric_columns(&self) -> Vec<String> {
        (0..self.num_columns())
            .filter(|&idx| self.numeric_column(idx).is_none())
            .map(|idx| self.headers[idx].clone())
            .collect()
    }

    /// Parse the column called `name` as floats.
    pub fn numeric_column_by_name(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| LoaderError::MissingColumn(name.to_string()))?;
        self.numeric_column(idx)
            .ok_or_else(|| LoaderError::NonNumericColumn(name.to_string()))
    }

    /// Build a new table holding the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Append a column. `values` must have one entry per row.
    pub fn push_column(&mut self, name: String, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.headers.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }
}

/// Parse a single cell. Blank cells are missing values.
fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Load a CSV file with a header row into a [`Table`].
///
/// Records shorter than the header are padded with empty cells; extra
/// trailing cells are dropped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid CSV, or has no
/// header row.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::with_capacity(64 * 1024, file));

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let width = headers.len();
    let mut table = Table::new(headers);

    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        table.rows.push(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_load_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_csv(
            temp_dir.path(),
            "trial.csv",
            "timestamp,joint_1,label\n0.0,1.5,a\n0.1,1.7,b\n",
        );

        let table = load_table(&path).unwrap();
        assert_eq!(table.headers, vec!["timestamp", "joint_1", "label"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["0.1", "1.7", "b"]);
    }

    #[test]
    fn test_load_table_pads_short_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_csv(temp_dir.path(), "short.csv", "a,b,c\n1,2\n1,2,3,4\n");

        let table = load_table(&path).unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_load_table_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_csv(temp_dir.path(), "empty.csv", "");

        let result = load_table(&path);
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_numeric_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_csv(
            temp_dir.path(),
            "trial.csv",
            "timestamp,joint_1,label\n0.0,1.5,a\n0.1,,b\n",
        );
        let table = load_table(&path).unwrap();

        let ts = table.numeric_column(0).unwrap();
        assert_eq!(ts, vec![0.0, 0.1]);

        let joint = table.numeric_column(1).unwrap();
        assert_eq!(joint[0], 1.5);
        assert!(joint[1].is_nan());

        assert!(table.numeric_column(2).is_none());
    }

    #[test]
    fn test_integer_and_text_columns() {
        let mut table = Table::new(vec!["t".into(), "x".into(), "label".into()]);
        table.rows.push(vec!["1000".into(), "1.5".into(), "3".into()]);
        table.rows.push(vec![" 1001".into(), "2".into(), "up".into()]);

        assert!(table.is_integer_column(0));
        assert!(!table.is_integer_column(1));
        assert_eq!(table.non_numeric_columns(), vec!["label".to_string()]);

        table.rows.push(vec!["".into(), "".into(), "".into()]);
        assert!(!table.is_integer_column(0));
    }

    #[test]
    fn test_numeric_column_by_name_errors() {
        let mut table = Table::new(vec!["t".into(), "name".into()]);
        table.rows.push(vec!["1".into(), "x".into()]);

        assert!(matches!(
            table.numeric_column_by_name("timestamp"),
            Err(LoaderError::MissingColumn(_))
        ));
        assert!(matches!(
            table.numeric_column_by_name("name"),
            Err(LoaderError::NonNumericColumn(_))
        ));
    }

    #[test]
    fn test_select_rows_and_push_column() {
        let mut table = Table::new(vec!["a".into()]);
        for i in 0..4 {
            table.rows.push(vec![i.to_string()]);
        }

        let picked = table.select_rows(&[3, 1]);
        assert_eq!(picked.rows, vec![vec!["3".to_string()], vec!["1".to_string()]]);

        table.push_column("b".into(), vec!["w".into(), "x".into(), "y".into(), "z".into()]);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.rows[2], vec!["2", "y"]);
    }
}
