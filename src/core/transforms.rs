//! Column statistics and numeric transforms over trial tables.
//!
//! Missing values are carried as `NaN` and skipped by every statistic, so a
//! sparse column still gets a variation score from the samples it does have.
//! Per-column work is parallelized using Rayon.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;

use super::loaders::Table;

/// Spread of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnVariation {
    /// Sample standard deviation (ddof = 1)
    pub std: f64,
    /// max - min
    pub range: f64,
    /// std * range
    pub combined_score: f64,
}

/// Sample standard deviation of the non-missing values.
///
/// Returns `NaN` when fewer than two values are present.
pub fn sample_std(values: &[f64]) -> f64 {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = present.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean = present.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

/// Difference between the largest and smallest non-missing value.
pub fn value_range(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        f64::NAN
    } else {
        max - min
    }
}

/// Compute the variation of a column, or `None` if it has no values.
pub fn column_variation(values: &[f64]) -> Option<ColumnVariation> {
    if values.iter().all(|v| v.is_nan()) {
        return None;
    }

    let std = sample_std(values);
    let range = value_range(values);

    Some(ColumnVariation {
        std,
        range,
        combined_score: std * range,
    })
}

/// Variation of every numeric column not listed in `exclude`.
///
/// Results keep the table's column order. Non-numeric and all-missing
/// columns are left out.
pub fn column_variations(table: &Table, exclude: &[&str]) -> Vec<(String, ColumnVariation)> {
    (0..table.num_columns())
        .into_par_iter()
        .filter(|&idx| !exclude.contains(&table.headers[idx].as_str()))
        .filter_map(|idx| {
            let values = table.numeric_column(idx)?;
            let variation = column_variation(&values)?;
            Some((table.headers[idx].clone(), variation))
        })
        .collect()
}

/// Names of the `top_n` columns with the highest combined score.
///
/// Columns whose score is `NaN` sort last; ties keep column order.
pub fn dominant_columns(variations: &[(String, ColumnVariation)], top_n: usize) -> Vec<String> {
    let mut ranked: Vec<&(String, ColumnVariation)> = variations.iter().collect();
    ranked.sort_by(|a, b| descending_score(a.1.combined_score, b.1.combined_score));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(name, _)| name.clone())
        .collect()
}

fn descending_score(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// First difference: `out[0]` is `NaN`, `out[i] = values[i] - values[i - 1]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }

    out.push(f64::NAN);
    out.extend(values.windows(2).map(|w| w[1] - w[0]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.rows.push(row.iter().map(|c| c.to_string()).collect());
        }
        t
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((std - 2.13809).abs() < 1e-5);
    }

    #[test]
    fn test_sample_std_skips_missing() {
        let std = sample_std(&[1.0, f64::NAN, 3.0]);
        assert!((std - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range(&[3.0, -1.0, f64::NAN, 2.0]), 4.0);
        assert!(value_range(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_column_variation_all_missing() {
        assert!(column_variation(&[f64::NAN, f64::NAN]).is_none());
    }

    #[test]
    fn test_column_variations_skips_excluded_and_text() {
        let t = table(
            &["timestamp", "joint_1", "label", "joint_2"],
            &[&["0", "1", "a", "10"], &["1", "3", "b", "10"]],
        );

        let variations = column_variations(&t, &["timestamp"]);
        let names: Vec<&str> = variations.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["joint_1", "joint_2"]);

        let (_, joint_1) = &variations[0];
        assert_eq!(joint_1.range, 2.0);
        assert!((joint_1.combined_score - 2.0 * std::f64::consts::SQRT_2).abs() < 1e-12);

        let (_, joint_2) = &variations[1];
        assert_eq!(joint_2.combined_score, 0.0);
    }

    #[test]
    fn test_dominant_columns() {
        let v = |score: f64| ColumnVariation {
            std: 0.0,
            range: 0.0,
            combined_score: score,
        };
        let variations = vec![
            ("a".to_string(), v(1.0)),
            ("b".to_string(), v(f64::NAN)),
            ("c".to_string(), v(5.0)),
            ("d".to_string(), v(1.0)),
        ];

        assert_eq!(dominant_columns(&variations, 3), vec!["c", "a", "d"]);
        assert_eq!(dominant_columns(&variations, 10), vec!["c", "a", "d", "b"]);
        assert!(dominant_columns(&[], 5).is_empty());
    }

    #[test]
    fn test_diff() {
        let d = diff(&[1.0, 4.0, 2.0]);
        assert!(d[0].is_nan());
        assert_eq!(&d[1..], &[3.0, -2.0]);
        assert!(diff(&[]).is_empty());
    }
}
