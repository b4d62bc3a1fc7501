use oxidize_learn_core::Float;
use oxidize_learn_linalg::Matrix;

/// Contiguous slice `[start, start + length)` of the parameter indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: usize,
    pub length: usize,
}

impl IndexRange {
    pub fn new(start: usize, length: usize) -> Self {
        IndexRange { start, length }
    }

    /// Range covering all `len` parameters.
    pub fn full(len: usize) -> Self {
        IndexRange { start: 0, length: len }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }

    /// Splits the range into at most `parts` contiguous, non-empty
    /// sub-ranges whose concatenation is `self`. All but the last have the
    /// same length.
    pub fn partition(&self, parts: usize) -> Vec<IndexRange> {
        assert!(parts > 0, "cannot partition into zero parts");
        if self.length == 0 {
            return Vec::new();
        }
        let chunk = self.length.div_ceil(parts);
        (self.start..self.end())
            .step_by(chunk)
            .map(|start| IndexRange::new(start, chunk.min(self.end() - start)))
            .collect()
    }
}

/// Rows a gradient is averaged over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch<'a> {
    /// Every row of the training set.
    All,
    /// Only the listed row indices, as drawn by stochastic descent.
    Rows(&'a [usize]),
}

/// Callback contract between an optimization algorithm and the model it
/// trains.
///
/// The algorithm owns the parameter vector and mutates it between calls;
/// the delegate only ever reads it. `cost` is unregularized: when `lambda > 0`
/// the algorithm adds the L2 penalty, skipping
/// [`bias_index`](OptimizationDelegate::bias_index), to the cost it tests for
/// convergence. `gradient` must already include the model's regularization
/// term; the algorithm applies it unchanged.
///
/// `gradient` may be invoked concurrently for disjoint ranges, so it must
/// not mutate shared state.
pub trait OptimizationDelegate<T: Float>: Send + Sync {
    /// Called once before the first iteration.
    fn on_run_start(&mut self, initial: &[T]);

    /// Called once per outer iteration, before cost and gradient.
    fn on_iteration_start(&mut self) {}

    fn cost(&self, parameters: &[T]) -> T;

    /// Writes the partial derivatives for `range` into `out`
    /// (`out.len() == range.length`), averaged over `batch`.
    fn gradient(&self, parameters: &[T], batch: Batch<'_>, range: IndexRange, out: &mut [T]);

    /// Parameter excluded from regularization.
    fn bias_index(&self) -> Option<usize> {
        Some(0)
    }

    /// Design matrix for closed-form solvers.
    fn design_matrix(&self) -> Option<&Matrix<T>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_concatenates_to_full_range() {
        let full = IndexRange::full(10);
        let parts = full.partition(3);
        assert_eq!(
            parts,
            vec![IndexRange::new(0, 4), IndexRange::new(4, 4), IndexRange::new(8, 2)]
        );
        assert_eq!(parts.iter().map(|r| r.length).sum::<usize>(), 10);
        assert_eq!(parts.last().unwrap().end(), full.end());
    }

    #[test]
    fn test_partition_more_parts_than_indices() {
        let parts = IndexRange::new(5, 2).partition(8);
        assert_eq!(parts, vec![IndexRange::new(5, 1), IndexRange::new(6, 1)]);
        assert!(parts[0].contains(5));
        assert!(!parts[0].contains(6));
    }
}
