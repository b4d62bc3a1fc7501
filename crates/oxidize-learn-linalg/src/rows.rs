use std::ops::Range;

use oxidize_learn_core::Float;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::matrix::Matrix;
use crate::normalize::Normalization;

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

impl<T: Float> Matrix<T> {
    /// Copy made of the given rows, in the given order. Output values and
    /// normalization statistics follow along.
    pub fn select_rows(&self, indices: &[usize]) -> Matrix<T> {
        assert!(!indices.is_empty(), "cannot select zero rows");
        let mut data = Vec::with_capacity(indices.len() * self.stride());
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        let output = self
            .output
            .as_ref()
            .map(|out| indices.iter().map(|&i| out[i]).collect());
        Matrix::from_parts(
            indices.len(),
            self.column_count,
            self.has_bias_column,
            data,
            output,
            self.normalization.clone(),
        )
    }

    /// Copy with rows in a uniformly random order.
    pub fn shuffled(&self, seed: Option<u64>) -> Matrix<T> {
        let mut indices: Vec<usize> = (0..self.row_count).collect();
        indices.shuffle(&mut rng(seed));
        self.select_rows(&indices)
    }

    /// `row_count` rows drawn without replacement, in random order.
    pub fn shuffled_submatrix(&self, row_count: usize, seed: Option<u64>) -> Matrix<T> {
        assert!(
            row_count > 0 && row_count <= self.row_count,
            "cannot draw {} of {} rows",
            row_count,
            self.row_count
        );
        let mut indices: Vec<usize> = (0..self.row_count).collect();
        indices.shuffle(&mut rng(seed));
        self.select_rows(&indices[..row_count])
    }

    /// Splits rows into `(training, test)` partitions.
    ///
    /// The first `round(row_count * training_bias)` rows go to training, the
    /// rest to test; order is preserved, so shuffle first for a random split.
    ///
    /// # Panics
    /// If `training_bias` is outside `(0, 1)` or either partition would be
    /// empty.
    pub fn split(&self, training_bias: f64) -> (Matrix<T>, Matrix<T>) {
        assert!(
            training_bias > 0.0 && training_bias < 1.0,
            "training bias must lie in (0, 1), got {}",
            training_bias
        );
        let training_rows = (self.row_count as f64 * training_bias).round() as usize;
        assert!(
            training_rows > 0 && training_rows < self.row_count,
            "a training bias of {} leaves an empty partition of {} rows",
            training_bias,
            self.row_count
        );
        (
            self.submatrix_rows(0..training_rows),
            self.submatrix_rows(training_rows..self.row_count),
        )
    }

    /// Copy of the rows in `range`.
    pub fn submatrix_rows(&self, range: Range<usize>) -> Matrix<T> {
        assert!(
            range.start < range.end && range.end <= self.row_count,
            "row range {:?} out of bounds ({} rows)",
            range,
            self.row_count
        );
        let stride = self.stride();
        let data = self.data[range.start * stride..range.end * stride].to_vec();
        let output = self.output.as_ref().map(|out| out[range.clone()].to_vec());
        Matrix::from_parts(
            range.len(),
            self.column_count,
            self.has_bias_column,
            data,
            output,
            self.normalization.clone(),
        )
    }

    /// Copy of the first `row_count` rows and first `column_count` feature
    /// columns; the bias column is kept.
    pub fn submatrix(&self, row_count: usize, column_count: usize) -> Matrix<T> {
        assert!(
            row_count > 0 && row_count <= self.row_count,
            "row count {} out of bounds ({} rows)",
            row_count,
            self.row_count
        );
        assert!(
            column_count > 0 && column_count <= self.column_count,
            "column count {} out of bounds ({} columns)",
            column_count,
            self.column_count
        );
        let keep = column_count + usize::from(self.has_bias_column);
        let mut data = Vec::with_capacity(row_count * keep);
        for row in self.rows().take(row_count) {
            data.extend_from_slice(&row[..keep]);
        }
        let output = self.output.as_ref().map(|out| out[..row_count].to_vec());
        let normalization = self.normalization.as_ref().map(|n| Normalization {
            mean: n.mean[..column_count].to_vec(),
            std_dev: n.std_dev[..column_count].to_vec(),
        });
        Matrix::from_parts(row_count, column_count, self.has_bias_column, data, output, normalization)
    }
}
