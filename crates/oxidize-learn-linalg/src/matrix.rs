use oxidize_learn_core::{Float, LearnError, LearnResult, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::Normalization;

/// Dense row-major table of examples with an optional output vector.
///
/// When `has_bias_column` is set, column 0 of every stored row is 1.0 and
/// `column_count` excludes it; the row stride is `column_count + 1`.
/// Matrices are logically immutable apart from [`Matrix::modify_output`],
/// [`Matrix::clip_row_count`] and the one-time [`Matrix::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Matrix<T: Float> {
    pub(crate) row_count: usize,
    pub(crate) column_count: usize,
    pub(crate) has_bias_column: bool,
    pub(crate) data: Vec<T>,
    pub(crate) output: Option<Vec<T>>,
    pub(crate) normalization: Option<Normalization<T>>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Matrix<T> {
    /// Builds a matrix by letting `fill` write the feature buffer
    /// (`row_count × column_count`, row-major, without the bias column) and,
    /// when `with_output` is set, the output vector.
    ///
    /// Returns `Err(PreparationFailed)` if `fill` returns `false`.
    ///
    /// # Panics
    /// If `row_count` or `column_count` is zero.
    pub fn from_buffers<F>(
        row_count: usize,
        column_count: usize,
        add_bias: bool,
        with_output: bool,
        fill: F,
    ) -> LearnResult<Self>
    where
        F: FnOnce(&mut [T], Option<&mut [T]>) -> bool,
    {
        assert!(row_count > 0, "matrix row count must be non-zero");
        assert!(column_count > 0, "matrix column count must be non-zero");

        let mut features = vec![T::ZERO; row_count * column_count];
        let mut output = with_output.then(|| vec![T::ZERO; row_count]);

        if !fill(&mut features, output.as_deref_mut()) {
            return Err(LearnError::PreparationFailed);
        }

        Ok(Self::with_features(row_count, column_count, add_bias, features, output))
    }

    /// Builds a matrix from nested rows (without the bias column).
    ///
    /// # Panics
    /// If `rows` is empty or its rows are empty.
    pub fn from_rows(rows: &[Vec<T>], output: Option<&[T]>, add_bias: bool) -> LearnResult<Self> {
        assert!(!rows.is_empty(), "matrix row count must be non-zero");
        let column_count = rows[0].len();
        assert!(column_count > 0, "matrix column count must be non-zero");

        if let Some(row) = rows.iter().find(|r| r.len() != column_count) {
            return Err(LearnError::DimensionMismatch(format!(
                "expected rows of {} columns, found one with {}",
                column_count,
                row.len()
            )));
        }
        if let Some(out) = output {
            if out.len() != rows.len() {
                return Err(LearnError::DimensionMismatch(format!(
                    "output vector has {} values for {} rows",
                    out.len(),
                    rows.len()
                )));
            }
        }

        let features: Vec<T> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Self::with_features(
            rows.len(),
            column_count,
            add_bias,
            features,
            output.map(<[T]>::to_vec),
        ))
    }

    /// Identity matrix of size n×n.
    pub fn identity(n: usize) -> Self {
        assert!(n > 0, "identity size must be non-zero");
        let mut data = vec![T::ZERO; n * n];
        for i in 0..n {
            data[i * n + i] = T::ONE;
        }
        Self::from_parts(n, n, false, data, None, None)
    }

    fn with_features(
        row_count: usize,
        column_count: usize,
        add_bias: bool,
        features: Vec<T>,
        output: Option<Vec<T>>,
    ) -> Self {
        let data = if add_bias {
            let mut data = Vec::with_capacity(row_count * (column_count + 1));
            for row in features.chunks_exact(column_count) {
                data.push(T::ONE);
                data.extend_from_slice(row);
            }
            data
        } else {
            features
        };
        Self::from_parts(row_count, column_count, add_bias, data, output, None)
    }

    pub(crate) fn from_parts(
        row_count: usize,
        column_count: usize,
        has_bias_column: bool,
        data: Vec<T>,
        output: Option<Vec<T>>,
        normalization: Option<Normalization<T>>,
    ) -> Self {
        let stride = column_count + usize::from(has_bias_column);
        debug_assert_eq!(data.len(), row_count * stride);
        debug_assert!(output.as_ref().map_or(true, |o| o.len() == row_count));
        Matrix {
            row_count,
            column_count,
            has_bias_column,
            data,
            output,
            normalization,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Feature columns, excluding the bias column.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn has_bias_column(&self) -> bool {
        self.has_bias_column
    }

    /// Stored values per row, including the bias column.
    pub fn stride(&self) -> usize {
        self.column_count + usize::from(self.has_bias_column)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn output(&self) -> Option<&[T]> {
        self.output.as_deref()
    }

    /// Read-only view of row `index`, bias column included.
    pub fn row(&self, index: usize) -> &[T] {
        assert!(index < self.row_count, "row {} out of bounds ({} rows)", index, self.row_count);
        let stride = self.stride();
        &self.data[index * stride..(index + 1) * stride]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.stride())
    }

    /// Owned copy of stored column `index` (column 0 is the bias column
    /// when present).
    pub fn column(&self, index: usize) -> Vector<'static, T> {
        let stride = self.stride();
        assert!(index < stride, "column {} out of bounds ({} columns)", index, stride);
        Vector::from_vec(self.rows().map(|row| row[index]).collect())
    }

    // ─── In-place mutation ──────────────────────────────────────────────────

    /// Mutable access to the output vector; `f` receives it with the row count.
    ///
    /// # Panics
    /// If the matrix has no output vector.
    pub fn modify_output<F: FnOnce(&mut [T], usize)>(&mut self, f: F) {
        let rows = self.row_count;
        let output = self
            .output
            .as_deref_mut()
            .expect("modify_output requires a matrix with an output vector");
        f(output, rows);
    }

    /// Drops every row past `row_count`.
    pub fn clip_row_count(&mut self, row_count: usize) {
        assert!(
            row_count > 0 && row_count <= self.row_count,
            "cannot clip {} rows to {}",
            self.row_count,
            row_count
        );
        self.data.truncate(row_count * self.stride());
        if let Some(output) = self.output.as_mut() {
            output.truncate(row_count);
        }
        self.row_count = row_count;
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Float> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "matrix([")?;
        for (i, row) in self.rows().take(8).enumerate() {
            write!(f, "  [")?;
            for (j, v) in row.iter().take(8).enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:.4}", v)?;
            }
            if row.len() > 8 {
                write!(f, ", ...")?;
            }
            write!(f, "]")?;
            if let Some(output) = &self.output {
                write!(f, " -> {:.4}", output[i])?;
            }
            writeln!(f, ",")?;
        }
        if self.row_count > 8 {
            writeln!(f, "  ...")?;
        }
        write!(f, "], rows={}, columns={}", self.row_count, self.column_count)?;
        if self.has_bias_column {
            write!(f, " + bias")?;
        }
        Ok(())
    }
}
