use oxidize_learn_core::{Float, LearnError, LearnResult};

use crate::decomposition::lu;
use crate::matrix::Matrix;

// Every operation here works on the stored buffer, so a bias column takes
// part as an ordinary column. Results carry no bias flag and no output.

impl<T: Float> Matrix<T> {
    /// Matrix product `self × other`.
    pub fn multiply(&self, other: &Matrix<T>) -> LearnResult<Matrix<T>> {
        let (m, k) = (self.row_count, self.stride());
        let n = other.stride();
        if k != other.row_count {
            return Err(LearnError::DimensionMismatch(format!(
                "cannot multiply {}×{} by {}×{}",
                m, k, other.row_count, n
            )));
        }

        let mut data = vec![T::ZERO; m * n];
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                for j in 0..n {
                    data[i * n + j] += a * other.data[p * n + j];
                }
            }
        }
        Ok(Matrix::from_parts(m, n, false, data, None, None))
    }

    pub fn transposed(&self) -> Matrix<T> {
        let (m, n) = (self.row_count, self.stride());
        let mut data = vec![T::ZERO; m * n];
        for i in 0..m {
            for j in 0..n {
                data[j * m + i] = self.data[i * n + j];
            }
        }
        Matrix::from_parts(n, m, false, data, None, None)
    }

    /// Sample covariance of the feature columns (bias excluded), as a
    /// `column_count × column_count` matrix.
    pub fn covariance(&self) -> Matrix<T> {
        let offset = usize::from(self.has_bias_column);
        let c = self.column_count;
        let n_t = T::from_usize(self.row_count);

        let mut mean = vec![T::ZERO; c];
        for row in self.rows() {
            for (m, &x) in mean.iter_mut().zip(&row[offset..]) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n_t);

        let mut data = vec![T::ZERO; c * c];
        for row in self.rows() {
            let features = &row[offset..];
            for a in 0..c {
                let da = features[a] - mean[a];
                for b in a..c {
                    data[a * c + b] += da * (features[b] - mean[b]);
                }
            }
        }

        let dof = T::from_usize(self.row_count.saturating_sub(1).max(1));
        for a in 0..c {
            for b in a..c {
                let v = data[a * c + b] / dof;
                data[a * c + b] = v;
                data[b * c + a] = v;
            }
        }
        Matrix::from_parts(c, c, false, data, None, None)
    }

    /// Inverse via LU decomposition with partial pivoting.
    pub fn inverted(&self) -> LearnResult<Matrix<T>> {
        let n = self.require_square("invert")?;
        let decomp = lu(&self.data, n)?;

        let mut data = vec![T::ZERO; n * n];
        let mut e = vec![T::ZERO; n];
        for col in 0..n {
            e.iter_mut().for_each(|v| *v = T::ZERO);
            e[col] = T::ONE;
            let x = decomp.solve(&e);
            for row in 0..n {
                data[row * n + col] = x[row];
            }
        }
        Ok(Matrix::from_parts(n, n, false, data, None, None))
    }

    /// Determinant; 0 for a singular matrix.
    pub fn determinant(&self) -> LearnResult<T> {
        let n = self.require_square("take the determinant of")?;
        match lu(&self.data, n) {
            Ok(decomp) => Ok(decomp.determinant()),
            Err(LearnError::SingularMatrix) => Ok(T::ZERO),
            Err(e) => Err(e),
        }
    }

    fn require_square(&self, op: &str) -> LearnResult<usize> {
        let n = self.stride();
        if self.row_count != n {
            return Err(LearnError::DimensionMismatch(format!(
                "cannot {} a non-square {}×{} matrix",
                op, self.row_count, n
            )));
        }
        Ok(n)
    }
}
