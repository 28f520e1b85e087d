//! Rate-of-change columns for a trial recording.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::loaders::{load_table, LoaderError, Table};
use crate::core::transforms::diff;
use crate::core::writers::{format_float, write_table};

/// Suffix of estimate columns that get no derivative.
const ESTIMATE_SUFFIX: &str = "_hat";

/// Name of the derivative column for `col`.
pub fn rate_column_name(col: &str) -> String {
    format!("d_{}__dt", col)
}

/// Append `d_<col>__dt` for every numeric column and drop incomplete rows.
///
/// The timestamp column, non-numeric columns and `*_hat` columns get no
/// derivative. Afterwards any row holding a blank cell or a `NaN` is
/// removed, which always includes the first row. Infinite rates (zero time
/// step) are kept.
pub fn add_rate_columns(table: &Table, timestamp_col: &str) -> Result<Table, LoaderError> {
    let times = table.numeric_column_by_name(timestamp_col)?;
    let dt = diff(&times);

    let mut derived = table.clone();

    for (idx, name) in table.headers.iter().enumerate() {
        if name == timestamp_col || name.ends_with(ESTIMATE_SUFFIX) {
            continue;
        }
        let values = match table.numeric_column(idx) {
            Some(values) => values,
            None => continue,
        };

        let rates: Vec<String> = diff(&values)
            .iter()
            .zip(&dt)
            .map(|(dv, dt)| format_float(dv / dt))
            .collect();
        derived.push_column(rate_column_name(name), rates);
    }

    let keep: Vec<usize> = derived
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().all(|cell| is_present(cell)))
        .map(|(i, _)| i)
        .collect();

    Ok(derived.select_rows(&keep))
}

fn is_present(cell: &str) -> bool {
    let cell = cell.trim();
    !cell.is_empty() && !cell.parse::<f64>().map(f64::is_nan).unwrap_or(false)
}

/// Load `input`, add rate columns and write the result to `output`.
///
/// Returns the number of rows written.
pub fn derive_file(input: &Path, output: &Path, timestamp_col: &str) -> Result<usize> {
    let table = load_table(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let derived = add_rate_columns(&table, timestamp_col)
        .with_context(|| format!("Failed to compute rates for {}", input.display()))?;

    write_table(output, &derived)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(derived.len())
}
