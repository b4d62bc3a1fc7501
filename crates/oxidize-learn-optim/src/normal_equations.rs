use oxidize_learn_core::{Float, LearnError, LearnResult, Vector};
use oxidize_learn_linalg::Matrix;
use tracing::debug;

use crate::algorithm::OptimizationAlgorithm;
use crate::delegate::OptimizationDelegate;
use crate::report::{RunReport, RunState};

/// Closed-form least squares: `θ = (XᵀX)⁻¹ Xᵀ y`.
///
/// Uses only matrix algebra; no regularization is applied here. Callers
/// wanting ridge behaviour fold the penalty into the matrix beforehand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalEquations;

impl NormalEquations {
    pub fn new() -> Self {
        NormalEquations
    }

    /// One coefficient per stored column of `matrix` (bias included).
    pub fn solve<T: Float>(matrix: &Matrix<T>) -> LearnResult<Vec<T>> {
        let y = matrix.output().ok_or(LearnError::MissingOutputVector)?;

        let xt = matrix.transposed();
        let xtx_inv = xt.multiply(matrix)?.inverted()?;
        let xty: Vec<T> = xt
            .rows()
            .map(|row| row.iter().zip(y).map(|(&a, &b)| a * b).sum())
            .collect();

        Ok(xtx_inv
            .rows()
            .map(|row| row.iter().zip(&xty).map(|(&a, &b)| a * b).sum())
            .collect())
    }
}

impl<T: Float> OptimizationAlgorithm<T> for NormalEquations {
    /// Solves against [`OptimizationDelegate::design_matrix`] without invoking
    /// any other delegate callback.
    fn run(
        &self,
        parameters: &mut Vector<'_, T>,
        _row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
    ) -> LearnResult<RunReport<T>> {
        let matrix = delegate.design_matrix().ok_or(LearnError::MissingDesignMatrix)?;
        let theta = NormalEquations::solve(matrix)?;
        if theta.len() != parameters.len() {
            return Err(LearnError::DimensionMismatch(format!(
                "normal equations produced {} coefficients for {} parameters",
                theta.len(),
                parameters.len()
            )));
        }
        parameters.make_mut().copy_from_slice(&theta);
        debug!(parameters = theta.len(), "normal equations solved");

        Ok(RunReport {
            state: RunState::Converged,
            iterations: 1,
            final_cost: None,
        })
    }
}
