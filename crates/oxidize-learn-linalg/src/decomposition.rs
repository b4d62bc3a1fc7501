use oxidize_learn_core::{Float, LearnError, LearnResult};

/// LU decomposition with partial pivoting: `P * A = L * U`.
///
/// `l` is unit lower triangular and `u` upper triangular, both n×n row-major.
/// `pivot[i]` is the source row of row `i` of `P * A`.
pub struct LuDecomposition<T: Float> {
    pub n: usize,
    pub l: Vec<T>,
    pub u: Vec<T>,
    pub pivot: Vec<usize>,
    /// Number of row swaps performed, for the determinant sign.
    pub swaps: usize,
}

/// Factors the n×n row-major matrix `a`.
///
/// Returns `Err(SingularMatrix)` when a pivot is no larger than
/// `n · ε · max|a_ij|`, the round-off left behind by a rank-deficient matrix.
pub fn lu<T: Float>(a: &[T], n: usize) -> LearnResult<LuDecomposition<T>> {
    if a.len() != n * n {
        return Err(LearnError::DimensionMismatch(format!(
            "LU expects {}×{} values, got {}",
            n,
            n,
            a.len()
        )));
    }

    let mut u = a.to_vec();
    let mut l = vec![T::ZERO; n * n];
    let mut pivot: Vec<usize> = (0..n).collect();
    let mut swaps = 0;

    let scale = a.iter().fold(T::ZERO, |acc, v| acc.max(v.abs()));
    let tolerance = T::from_usize(n) * T::EPSILON * scale;

    for k in 0..n {
        // Find pivot
        let mut max_val = u[k * n + k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = u[i * n + k].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }

        if max_val <= tolerance {
            return Err(LearnError::SingularMatrix);
        }

        if max_row != k {
            pivot.swap(k, max_row);
            swaps += 1;
            for j in 0..n {
                u.swap(k * n + j, max_row * n + j);
            }
            // Only the already computed columns of L move
            for j in 0..k {
                l.swap(k * n + j, max_row * n + j);
            }
        }

        l[k * n + k] = T::ONE;

        for i in (k + 1)..n {
            let factor = u[i * n + k] / u[k * n + k];
            l[i * n + k] = factor;
            for j in k..n {
                u[i * n + j] = u[i * n + j] - factor * u[k * n + j];
            }
        }
    }

    Ok(LuDecomposition { n, l, u, pivot, swaps })
}

impl<T: Float> LuDecomposition<T> {
    /// Solves `A x = b` for a single right-hand side.
    pub fn solve(&self, b: &[T]) -> Vec<T> {
        let n = self.n;
        debug_assert_eq!(b.len(), n);

        // Forward substitution: L * y = P * b
        let mut y = vec![T::ZERO; n];
        for i in 0..n {
            let mut sum = T::ZERO;
            for j in 0..i {
                sum += self.l[i * n + j] * y[j];
            }
            y[i] = b[self.pivot[i]] - sum;
        }

        // Back substitution: U * x = y
        let mut x = vec![T::ZERO; n];
        for i in (0..n).rev() {
            let mut sum = T::ZERO;
            for j in (i + 1)..n {
                sum += self.u[i * n + j] * x[j];
            }
            x[i] = (y[i] - sum) / self.u[i * n + i];
        }
        x
    }

    pub fn determinant(&self) -> T {
        let n = self.n;
        let d = (0..n).fold(T::ONE, |acc, i| acc * self.u[i * n + i]);
        if self.swaps % 2 == 1 {
            -d
        } else {
            d
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(decomp: &LuDecomposition<f64>) -> Vec<f64> {
        let n = decomp.n;
        let mut lu = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                lu[i * n + j] = (0..n).map(|k| decomp.l[i * n + k] * decomp.u[k * n + j]).sum();
            }
        }
        lu
    }

    #[test]
    fn test_lu() {
        let a = [2.0, 1.0, 1.0, 4.0, 3.0, 3.0, 8.0, 7.0, 9.0];
        let decomp = lu(&a, 3).unwrap();
        let lu_product = reconstruct(&decomp);
        for i in 0..3 {
            for j in 0..3 {
                let expected = a[decomp.pivot[i] * 3 + j];
                assert!((lu_product[i * 3 + j] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_solve() {
        // 2x + y = 5
        // x + 3y = 7
        let decomp = lu(&[2.0, 1.0, 1.0, 3.0], 2).unwrap();
        let x = decomp.solve(&[5.0, 7.0]);
        assert!((x[0] - 1.6).abs() < 1e-10);
        assert!((x[1] - 1.8).abs() < 1e-10);
    }

    #[test]
    fn test_singular() {
        let result = lu(&[1.0, 2.0, 2.0, 4.0], 2);
        assert!(matches!(result, Err(LearnError::SingularMatrix)));
    }

    #[test]
    fn test_round_off_pivot_is_singular() {
        // Gram matrix of [1, x, 3x] for x = 0.1..0.5; the last pivot is
        // round-off a little above f64::EPSILON
        let xs: Vec<f64> = (1..=5).map(|i| 0.1 * i as f64).collect();
        let cols: Vec<Vec<f64>> = vec![vec![1.0; 5], xs.clone(), xs.iter().map(|x| 3.0 * x).collect()];
        let mut gram = vec![0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                gram[i * 3 + j] = cols[i].iter().zip(&cols[j]).map(|(a, b)| a * b).sum();
            }
        }
        assert!(matches!(lu(&gram, 3), Err(LearnError::SingularMatrix)));
    }

    #[test]
    fn test_small_but_regular_matrix() {
        // Singularity is judged relative to the matrix scale
        let decomp = lu(&[2e-20, 1e-20, 1e-20, 3e-20], 2).unwrap();
        assert!((decomp.determinant() - 5e-40).abs() < 1e-50);
    }

    #[test]
    fn test_zero_matrix_is_singular() {
        assert!(matches!(lu(&[0.0f64; 4], 2), Err(LearnError::SingularMatrix)));
    }
}
