use oxidize_learn_core::Float;
use rayon::prelude::*;

use crate::delegate::{Batch, IndexRange, OptimizationDelegate};

/// Fills `out` with the full gradient, splitting the parameter indices with
/// [`IndexRange::partition`] and evaluating the ranges concurrently.
///
/// Each worker writes its own disjoint slice of `out`, so the result is the
/// concatenation of the per-range gradients. A single partition runs inline.
pub fn compute_gradient<T: Float>(
    delegate: &dyn OptimizationDelegate<T>,
    parameters: &[T],
    batch: Batch<'_>,
    partitions: usize,
    out: &mut [T],
) {
    let n = out.len();
    assert_eq!(n, parameters.len(), "gradient buffer length mismatch");
    if partitions <= 1 || n < 2 {
        delegate.gradient(parameters, batch, IndexRange::full(n), out);
        return;
    }

    let mut rest = out;
    let work: Vec<(IndexRange, &mut [T])> = IndexRange::full(n)
        .partition(partitions)
        .into_iter()
        .map(|range| {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.length);
            rest = tail;
            (range, head)
        })
        .collect();

    work.into_par_iter().for_each(|(range, slice)| {
        delegate.gradient(parameters, batch, range, slice);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::LinearRegression;

    #[test]
    fn test_partitioned_equals_serial() {
        let delegate = LinearRegression::wide(40, 9, 5);
        let params: Vec<f64> = (0..10).map(|j| 0.1 * j as f64 - 0.3).collect();

        let mut serial = vec![0.0; 10];
        compute_gradient(&delegate, &params, Batch::All, 1, &mut serial);

        for partitions in [2, 3, 4, 10, 16] {
            let mut parallel = vec![0.0; 10];
            compute_gradient(&delegate, &params, Batch::All, partitions, &mut parallel);
            for (a, b) in serial.iter().zip(&parallel) {
                assert!((a - b).abs() < 1e-12, "{} partitions", partitions);
            }
        }
    }
}
