use oxidize_learn_core::{CancellationToken, Float, LearnResult, Task};
use tracing::debug;

pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_SWEEPS: usize = 10_000;

/// Coordinate-wise hill climbing that maximizes a multivariate function
/// within per-dimension bounds.
///
/// Each sweep tries `θ_i + step_i` then `θ_i − step_i` for every dimension
/// (clamped to `[min_i, max_i]`) and keeps the first improving move. A sweep
/// without any improvement halves every step. The search stops once all
/// steps are below `tolerance` or after `max_sweeps` sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct HillClimbingSearch<T: Float> {
    pub parameters: Vec<T>,
    pub step_sizes: Vec<T>,
    pub min: Vec<T>,
    pub max: Vec<T>,
    pub tolerance: T,
    pub max_sweeps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HillClimbResult<T: Float> {
    pub parameters: Vec<T>,
    pub value: T,
    pub sweeps: usize,
}

impl<T: Float> HillClimbingSearch<T> {
    /// # Panics
    /// If the vectors are empty or differ in length, a step is not positive,
    /// or some `min_i > max_i`.
    pub fn new(parameters: Vec<T>, step_sizes: Vec<T>, min: Vec<T>, max: Vec<T>) -> Self {
        let n = parameters.len();
        assert!(n > 0, "hill climbing needs at least one parameter");
        assert!(
            step_sizes.len() == n && min.len() == n && max.len() == n,
            "parameters, step sizes and bounds must all have length {}",
            n
        );
        assert!(step_sizes.iter().all(|&s| s > T::ZERO), "step sizes must be positive");
        assert!(min.iter().zip(&max).all(|(lo, hi)| lo <= hi), "every min must be <= its max");

        HillClimbingSearch {
            parameters,
            step_sizes,
            min,
            max,
            tolerance: T::from_f64(DEFAULT_TOLERANCE),
            max_sweeps: DEFAULT_MAX_SWEEPS,
        }
    }

    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        assert!(tolerance > T::ZERO, "tolerance must be positive, got {}", tolerance);
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn run<F: Fn(&[T]) -> T>(&self, f: F) -> HillClimbResult<T> {
        match self.climb(f, None) {
            Ok(result) => result,
            Err(_) => unreachable!("hill climbing without a token cannot be cancelled"),
        }
    }

    /// Like [`run`](Self::run), but polls `token` before every sweep.
    pub fn run_with_cancel<F: Fn(&[T]) -> T>(
        &self,
        f: F,
        token: &CancellationToken,
    ) -> LearnResult<HillClimbResult<T>> {
        self.climb(f, Some(token))
    }

    pub fn spawn<F>(self, f: F) -> Task<HillClimbResult<T>>
    where
        F: Fn(&[T]) -> T + Send + 'static,
    {
        Task::spawn(move |token| self.climb(f, Some(&token)))
    }

    fn climb<F: Fn(&[T]) -> T>(
        &self,
        f: F,
        token: Option<&CancellationToken>,
    ) -> LearnResult<HillClimbResult<T>> {
        let mut current: Vec<T> = self
            .parameters
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&p, (&lo, &hi))| p.max(lo).min(hi))
            .collect();
        let mut steps = self.step_sizes.clone();
        let mut value = f(&current);
        let mut sweeps = 0;

        while sweeps < self.max_sweeps && steps.iter().any(|&s| s >= self.tolerance) {
            if let Some(token) = token {
                token.check()?;
            }
            sweeps += 1;

            let mut improved = false;
            for i in 0..current.len() {
                let original = current[i];
                for candidate in [original + steps[i], original - steps[i]] {
                    let candidate = candidate.max(self.min[i]).min(self.max[i]);
                    if candidate == original {
                        continue;
                    }
                    current[i] = candidate;
                    let v = f(&current);
                    if v > value {
                        value = v;
                        improved = true;
                        break;
                    }
                    current[i] = original;
                }
            }

            if !improved {
                steps.iter_mut().for_each(|s| *s *= T::HALF);
            }
        }

        debug!(sweeps, value = value.to_f64(), "hill climbing finished");
        Ok(HillClimbResult {
            parameters: current,
            value,
            sweeps,
        })
    }
}
