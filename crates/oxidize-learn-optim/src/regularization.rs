use oxidize_learn_core::Float;

use crate::delegate::IndexRange;

/// L2 (ridge) penalty weighted by `lambda`. A weight of zero disables it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regularization<T: Float> {
    lambda: T,
}

impl<T: Float> Regularization<T> {
    /// # Panics
    /// If `lambda` is negative or NaN.
    pub fn new(lambda: T) -> Self {
        assert!(lambda >= T::ZERO, "lambda must be non-negative, got {}", lambda);
        Regularization { lambda }
    }

    pub fn lambda(&self) -> T {
        self.lambda
    }

    pub fn is_enabled(&self) -> bool {
        self.lambda > T::ZERO
    }

    /// `λ / (2m) · Σ θ_j²` over every `j` except `bias`.
    pub fn penalty(&self, parameters: &[T], rows: usize, bias: Option<usize>) -> T {
        if !self.is_enabled() {
            return T::ZERO;
        }
        let sum: T = parameters
            .iter()
            .enumerate()
            .filter(|&(j, _)| Some(j) != bias)
            .map(|(_, &theta)| theta * theta)
            .sum();
        self.lambda / (T::TWO * T::from_usize(rows)) * sum
    }

    /// Adds `λ / m · θ_j` to `out` for every `j` in `range` except `bias`.
    ///
    /// Meant for delegates: algorithms never touch the gradient, so a
    /// regularized model calls this at the end of its own `gradient`.
    pub fn apply_to_gradient(
        &self,
        parameters: &[T],
        rows: usize,
        bias: Option<usize>,
        range: IndexRange,
        out: &mut [T],
    ) {
        if !self.is_enabled() {
            return;
        }
        let scale = self.lambda / T::from_usize(rows);
        for (offset, g) in out.iter_mut().enumerate().take(range.length) {
            let j = range.start + offset;
            if Some(j) != bias {
                *g += scale * parameters[j];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_penalty_skips_bias() {
        let reg = Regularization::new(2.0);
        // (2 / 4) * (4 + 9)
        assert_abs_diff_eq!(reg.penalty(&[100.0, 2.0, 3.0], 2, Some(0)), 6.5, epsilon = 1e-12);
        assert_abs_diff_eq!(reg.penalty(&[1.0, 2.0, 3.0], 2, None), 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_term() {
        let reg = Regularization::new(1.0);
        let mut out = [0.0, 0.0];
        reg.apply_to_gradient(&[5.0, 4.0, 6.0], 2, Some(0), IndexRange::new(1, 2), &mut out);
        assert_eq!(out, [2.0, 3.0]);
    }

    #[test]
    fn test_disabled() {
        let reg = Regularization::new(0.0);
        assert!(!reg.is_enabled());
        assert_eq!(reg.penalty(&[3.0, 4.0], 1, None), 0.0);
    }

    #[test]
    #[should_panic(expected = "lambda must be non-negative")]
    fn test_negative_lambda() {
        Regularization::new(-0.1);
    }
}
