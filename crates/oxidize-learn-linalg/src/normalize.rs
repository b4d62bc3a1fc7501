use oxidize_learn_core::Float;
use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// Per-column statistics recorded when a matrix is normalized.
///
/// Both vectors have one entry per feature column; the bias column is never
/// normalized and has no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Normalization<T: Float> {
    pub mean: Vec<T>,
    pub std_dev: Vec<T>,
}

impl<T: Float> Normalization<T> {
    /// Rewrites every feature as `(x - mean) / sd`.
    ///
    /// A zero-variance column is only centred, so it ends up at 0.
    pub fn apply(&self, features: &mut [T]) {
        debug_assert_eq!(features.len(), self.mean.len());
        for ((x, &mean), &sd) in features.iter_mut().zip(&self.mean).zip(&self.std_dev) {
            *x = (*x - mean) / divisor(sd);
        }
    }
}

fn divisor<T: Float>(sd: T) -> T {
    if sd.abs() < T::EPSILON {
        T::ONE
    } else {
        sd
    }
}

impl<T: Float> Matrix<T> {
    pub fn is_normalized(&self) -> bool {
        self.normalization.is_some()
    }

    pub fn normalization(&self) -> Option<&Normalization<T>> {
        self.normalization.as_ref()
    }

    /// # Panics
    /// If the matrix has not been normalized.
    pub fn normalization_mean(&self) -> &[T] {
        &self
            .normalization
            .as_ref()
            .expect("normalize() must be called before querying the mean vector")
            .mean
    }

    /// # Panics
    /// If the matrix has not been normalized.
    pub fn normalization_std_dev(&self) -> &[T] {
        &self
            .normalization
            .as_ref()
            .expect("normalize() must be called before querying the standard deviation vector")
            .std_dev
    }

    /// Normalizes every feature column to zero mean and unit sample standard
    /// deviation. Has no effect on an already normalized matrix.
    pub fn normalize(&mut self) {
        if self.is_normalized() {
            return;
        }
        let stats = self.column_statistics();
        self.apply_normalization(stats);
    }

    /// Normalized copy; an already normalized matrix is returned unchanged.
    pub fn normalized(&self) -> Matrix<T> {
        let mut m = self.clone();
        m.normalize();
        m
    }

    /// Copy normalized with caller-supplied statistics, typically the ones
    /// recorded on a training matrix. Always re-applies, even when `self`
    /// is already normalized.
    ///
    /// # Panics
    /// If either vector's length differs from `column_count`.
    pub fn normalized_with(&self, mean: &[T], std_dev: &[T]) -> Matrix<T> {
        assert_eq!(mean.len(), self.column_count, "mean vector length mismatch");
        assert_eq!(std_dev.len(), self.column_count, "standard deviation vector length mismatch");

        let mut m = self.clone();
        m.apply_normalization(Normalization {
            mean: mean.to_vec(),
            std_dev: std_dev.to_vec(),
        });
        m
    }

    /// Normalizes an external feature vector (without bias) in place using
    /// this matrix's recorded statistics.
    ///
    /// # Panics
    /// If the matrix has not been normalized or `features.len()` differs
    /// from `column_count`.
    pub fn normalize_vector(&self, features: &mut [T]) {
        let stats = self
            .normalization
            .as_ref()
            .expect("normalize() must be called before normalizing a vector");
        assert_eq!(features.len(), self.column_count, "feature vector length mismatch");
        stats.apply(features);
    }

    fn column_statistics(&self) -> Normalization<T> {
        let offset = usize::from(self.has_bias_column);
        let n = self.row_count;
        let n_t = T::from_usize(n);

        let mut mean = vec![T::ZERO; self.column_count];
        for row in self.rows() {
            for (m, &x) in mean.iter_mut().zip(&row[offset..]) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n_t);

        let mut std_dev = vec![T::ZERO; self.column_count];
        if n > 1 {
            for row in self.rows() {
                for ((s, &m), &x) in std_dev.iter_mut().zip(&mean).zip(&row[offset..]) {
                    let diff = x - m;
                    *s += diff * diff;
                }
            }
            let dof = T::from_usize(n - 1);
            std_dev.iter_mut().for_each(|s| *s = (*s / dof).sqrt());
        }

        Normalization { mean, std_dev }
    }

    fn apply_normalization(&mut self, stats: Normalization<T>) {
        let offset = usize::from(self.has_bias_column);
        let stride = self.stride();
        for row in self.data.chunks_exact_mut(stride) {
            stats.apply(&mut row[offset..]);
        }
        self.normalization = Some(stats);
    }
}
