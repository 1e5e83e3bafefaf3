//src/matrix.rs

use std::fmt::Write as FmtWrite;
use std::path::Path;

use ahash::AHashMap;

use crate::errors::{Error, Result};
use crate::tsv::{read_tsv, TsvTable};
use crate::types::{display_float, round_to};

/// Added before log-transforming depths so that zero depth stays finite.
pub const LOG_EPSILON: f64 = 1e-6;

/// Decimal places of every matrix dump.
pub const DUMP_DECIMALS: i32 = 6;

/// A dense numeric matrix with row and column labels
/// (bins or lineages × samples).
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    /// Header of the label column in text dumps (`Bins`, `Lineage`, ...)
    pub index_name: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Row-major, `rows.len()` rows of `columns.len()` values
    pub values: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    pub fn zeros(index_name: &str, rows: Vec<String>, columns: Vec<String>) -> Self {
        let values = vec![vec![0.0; columns.len()]; rows.len()];
        Self {
            index_name: index_name.to_string(),
            rows,
            columns,
            values,
        }
    }

    /// Reads a TSV whose first column holds row labels and whose other
    /// columns are numeric.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_table(&read_tsv(path)?, 0)
    }

    /// Uses column `label_col` as row labels and every other column as a
    /// numeric sample column.
    pub fn from_table(table: &TsvTable, label_col: usize) -> Result<Self> {
        let value_cols: Vec<usize> = (0..table.header.len()).filter(|&j| j != label_col).collect();
        if value_cols.is_empty() {
            return Err(Error::EmptyInput(format!("{} has no sample columns", table.source)));
        }

        let mut rows = Vec::with_capacity(table.len());
        let mut values = Vec::with_capacity(table.len());
        for i in 0..table.len() {
            rows.push(table.rows[i][label_col].clone());
            let row = value_cols
                .iter()
                .map(|&j| table.parse_f64(i, j))
                .collect::<Result<Vec<f64>>>()?;
            values.push(row);
        }

        Ok(Self {
            index_name: table.header[label_col].clone(),
            rows,
            columns: value_cols.iter().map(|&j| table.header[j].clone()).collect(),
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Number of positive cells in each row.
    pub fn positive_counts(&self) -> Vec<usize> {
        self.values
            .iter()
            .map(|row| row.iter().filter(|&&v| v > 0.0).count())
            .collect()
    }

    /// Rows reordered by descending positive count; ties keep their order.
    pub fn sort_rows_by_presence(&self) -> Self {
        let counts = self.positive_counts();
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(counts[i]));
        self.select_rows(&order)
    }

    pub fn select_rows(&self, order: &[usize]) -> Self {
        Self {
            index_name: self.index_name.clone(),
            rows: order.iter().map(|&i| self.rows[i].clone()).collect(),
            columns: self.columns.clone(),
            values: order.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    pub fn select_columns(&self, order: &[usize]) -> Self {
        Self {
            index_name: self.index_name.clone(),
            rows: self.rows.clone(),
            columns: order.iter().map(|&j| self.columns[j].clone()).collect(),
            values: self
                .values
                .iter()
                .map(|row| order.iter().map(|&j| row[j]).collect())
                .collect(),
        }
    }

    /// Columns in exactly the given order; names absent from the matrix become
    /// all-zero columns and columns not named are dropped.
    pub fn reindex_columns(&self, names: &[String]) -> Self {
        let position: AHashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(j, c)| (c.as_str(), j))
            .collect();
        let lookup: Vec<Option<usize>> = names.iter().map(|n| position.get(n.as_str()).copied()).collect();

        Self {
            index_name: self.index_name.clone(),
            rows: self.rows.clone(),
            columns: names.to_vec(),
            values: self
                .values
                .iter()
                .map(|row| lookup.iter().map(|j| j.map_or(0.0, |j| row[j])).collect())
                .collect(),
        }
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            index_name: self.index_name.clone(),
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|&v| f(v)).collect())
                .collect(),
        }
    }

    /// `log10(x + epsilon)` of every cell.
    pub fn log10_offset(&self, epsilon: f64) -> Self {
        self.map(|v| (v + epsilon).log10())
    }

    pub fn rounded(&self, places: i32) -> Self {
        self.map(|v| round_to(v, places))
    }

    /// Mean over all cells, 0 for an empty matrix.
    pub fn global_mean(&self) -> f64 {
        let n = self.n_rows() * self.n_cols();
        if n == 0 {
            return 0.0;
        }
        self.values.iter().flatten().sum::<f64>() / n as f64
    }

    /// (min, max) over all cells, `None` for an empty matrix.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Column-major copy, one vector per column.
    pub fn column_vectors(&self) -> Vec<Vec<f64>> {
        (0..self.n_cols())
            .map(|j| self.values.iter().map(|row| row[j]).collect())
            .collect()
    }

    /// Tab-separated dump: `index_name` + column labels, then one line per row.
    pub fn to_tsv_string(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.index_name);
        for column in &self.columns {
            output.push('\t');
            output.push_str(column);
        }
        output.push('\n');

        for (label, row) in self.rows.iter().zip(&self.values) {
            output.push_str(label);
            for &v in row {
                let _ = write!(output, "\t{}", display_float(v));
            }
            output.push('\n');
        }
        output
    }

    /// Writes the dump rounded to `DUMP_DECIMALS`.
    pub fn write_rounded_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.rounded(DUMP_DECIMALS).to_tsv_string())
            .map_err(|e| Error::file_io(path, e))
    }
}

/// Builds a `rows × columns` matrix holding the mean value of each
/// (row, column) pair. Triples outside the given labels are ignored and
/// pairs without observations stay 0.
pub fn pivot_mean<'a, I>(index_name: &str, rows: &[String], columns: &[String], triples: I) -> LabeledMatrix
where
    I: IntoIterator<Item = (&'a str, &'a str, f64)>,
{
    let row_pos: AHashMap<&str, usize> = rows.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect();
    let col_pos: AHashMap<&str, usize> = columns.iter().enumerate().map(|(j, c)| (c.as_str(), j)).collect();

    let mut matrix = LabeledMatrix::zeros(index_name, rows.to_vec(), columns.to_vec());
    let mut counts = vec![vec![0usize; columns.len()]; rows.len()];

    for (row, column, value) in triples {
        if let (Some(&i), Some(&j)) = (row_pos.get(row), col_pos.get(column)) {
            matrix.values[i][j] += value;
            counts[i][j] += 1;
        }
    }

    for (row, row_counts) in matrix.values.iter_mut().zip(&counts) {
        for (v, &n) in row.iter_mut().zip(row_counts) {
            if n > 0 {
                *v /= n as f64;
            }
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn depth_matrix() -> LabeledMatrix {
        LabeledMatrix {
            index_name: "bin".to_string(),
            rows: labels(&["b1", "b2", "b3"]),
            columns: labels(&["A", "B", "C"]),
            values: vec![
                vec![0.0, 0.0, 1.5],
                vec![5.0, 0.0, 3.0],
                vec![2.0, 1.0, 4.0],
            ],
        }
    }

    #[test]
    fn test_sort_rows_by_presence() {
        let sorted = depth_matrix().sort_rows_by_presence();
        assert_eq!(sorted.rows, labels(&["b3", "b2", "b1"]));
        assert_eq!(sorted.values[1], vec![5.0, 0.0, 3.0]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let m = LabeledMatrix {
            index_name: "bin".to_string(),
            rows: labels(&["x", "y", "z"]),
            columns: labels(&["A"]),
            values: vec![vec![1.0], vec![0.0], vec![2.0]],
        };
        assert_eq!(m.sort_rows_by_presence().rows, labels(&["x", "z", "y"]));
    }

    #[test]
    fn test_reindex_adds_zero_columns_in_declared_order() {
        let m = pivot_mean(
            "Lineage",
            &labels(&["L1"]),
            &labels(&["S3", "S1"]),
            vec![("L1", "S1", 0.5), ("L1", "S3", 0.25)],
        );
        let cohort = labels(&["S1", "S2", "S3"]);
        let r = m.reindex_columns(&cohort);
        assert_eq!(r.columns, cohort);
        assert_eq!(r.values, vec![vec![0.5, 0.0, 0.25]]);
    }

    #[test]
    fn test_pivot_mean_averages_and_ignores_unknown_labels() {
        let m = pivot_mean(
            "Lineage",
            &labels(&["L1", "L2"]),
            &labels(&["S1", "S2"]),
            vec![
                ("L1", "S1", 0.2),
                ("L1", "S1", 0.4),
                ("L2", "S2", 0.9),
                ("L3", "S1", 1.0),
                ("L1", "S9", 1.0),
            ],
        );
        assert!((m.values[0][0] - 0.3).abs() < 1e-12);
        assert_eq!(m.values[0][1], 0.0);
        assert_eq!(m.values[1], vec![0.0, 0.9]);
    }

    #[test]
    fn test_log_transform_and_dump() {
        let m = depth_matrix().sort_rows_by_presence().log10_offset(LOG_EPSILON);
        assert!((m.values[2][0] - (-6.0)).abs() < 1e-9);

        let dump = m.rounded(DUMP_DECIMALS);
        for (a, b) in dump.values.iter().flatten().zip(m.values.iter().flatten()) {
            assert!((a - b).abs() <= 1e-6);
        }

        let text = dump.to_tsv_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("bin\tA\tB\tC"));
        assert_eq!(lines.nth(1), Some("b2\t0.69897\t-6.0\t0.477121"));
    }

    #[test]
    fn test_global_mean_and_columns() {
        let m = depth_matrix();
        assert!((m.global_mean() - 16.5 / 9.0).abs() < 1e-12);
        assert_eq!(m.value_range(), Some((0.0, 5.0)));
        assert_eq!(m.column_vectors()[0], vec![0.0, 5.0, 2.0]);
        assert_eq!(m.select_columns(&[2, 0]).columns, labels(&["C", "A"]));
    }
}
