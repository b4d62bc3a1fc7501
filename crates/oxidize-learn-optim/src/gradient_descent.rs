use oxidize_learn_core::{BufferPool, CancellationToken, Float, LearnResult, Task, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::algorithm::OptimizationAlgorithm;
use crate::convergence::{ConvergenceWindow, DEFAULT_WINDOW_CAPACITY};
use crate::delegate::{Batch, IndexRange, OptimizationDelegate};
use crate::parallel;
use crate::regularization::Regularization;
use crate::report::{RunReport, RunState};
use crate::schedule::StepSize;

/// When a gradient descent run stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", bound = "T: Float")]
pub enum Stopping<T: Float> {
    /// Exactly this many outer iterations.
    Iterations(usize),
    /// Once the last window of costs are pairwise within this tolerance.
    /// There is no iteration cap in this mode.
    Threshold(T),
}

/// Batch or stochastic gradient descent with optional L2 regularization.
///
/// Each outer iteration evaluates the cost, then either one full-batch
/// update or `stochastic` single-row updates:
///
/// ```text
/// θ ← θ − α(k) · ∇J(θ)
/// ```
///
/// With `lambda > 0` the penalty `λ/(2m) Σ θ_j²` (bias excluded) is added to
/// the cost that feeds the convergence window and the report. The gradient
/// is used exactly as the delegate returns it, so a regularized model
/// includes its own `λ/m · θ_j` term (see [`Regularization::apply_to_gradient`]).
#[derive(Debug, Clone)]
pub struct GradientDescent<T: Float> {
    pub step: StepSize<T>,
    pub stopping: Stopping<T>,
    pub lambda: T,
    /// Single-row updates per outer iteration; `None` for batch descent.
    pub stochastic: Option<usize>,
    pub window_capacity: usize,
    /// Number of concurrent gradient ranges for batch updates.
    pub partitions: usize,
    pub seed: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

impl<T: Float> GradientDescent<T> {
    pub fn new(step: StepSize<T>, stopping: Stopping<T>) -> Self {
        if let Stopping::Threshold(eps) = stopping {
            assert!(eps > T::ZERO, "convergence threshold must be positive, got {}", eps);
        }
        GradientDescent {
            step,
            stopping,
            lambda: T::ZERO,
            stochastic: None,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            partitions: 1,
            seed: None,
            cancel: None,
        }
    }

    /// # Panics
    /// If `lambda` is negative.
    pub fn with_lambda(mut self, lambda: T) -> Self {
        assert!(lambda >= T::ZERO, "lambda must be non-negative, got {}", lambda);
        self.lambda = lambda;
        self
    }

    pub fn with_stochastic(mut self, step_count: usize) -> Self {
        assert!(step_count > 0, "stochastic step count must be non-zero");
        self.stochastic = Some(step_count);
        self
    }

    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "convergence window capacity must be non-zero");
        self.window_capacity = capacity;
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        assert!(partitions > 0, "gradient partitions must be non-zero");
        self.partitions = partitions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Runs the descent using gradient buffers from `pool`.
    ///
    /// A cancelled run returns `RunState::Cancelled` with the parameters of
    /// the last completed iteration.
    ///
    /// # Panics
    /// If `parameters` is empty or `row_count` is zero.
    pub fn run_with_pool(
        &self,
        parameters: &mut Vector<'_, T>,
        row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
        pool: &BufferPool<T>,
    ) -> LearnResult<RunReport<T>> {
        assert!(!parameters.is_empty(), "parameter vector must be non-empty");
        assert!(row_count > 0, "row count must be non-zero");

        let regularization = Regularization::new(self.lambda);
        let bias = delegate.bias_index();
        let mut window = ConvergenceWindow::new(self.window_capacity);
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        delegate.on_run_start(parameters.as_slice());
        let theta = parameters.make_mut();
        let n = theta.len();
        let full = IndexRange::full(n);
        let mut gradient = pool.allocate(n);

        debug!(
            parameters = n,
            rows = row_count,
            lambda = self.lambda.to_f64(),
            stochastic = ?self.stochastic,
            stopping = ?self.stopping,
            "gradient descent started"
        );

        let mut iterations = 0;
        let mut final_cost = None;
        let mut warned = false;

        let state = loop {
            if let Stopping::Iterations(limit) = self.stopping {
                if iterations >= limit {
                    break RunState::IterationLimitReached;
                }
            }
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                break RunState::Cancelled;
            }

            delegate.on_iteration_start();
            let cost = delegate.cost(theta) + regularization.penalty(theta, row_count, bias);
            final_cost = Some(cost);
            if !cost.is_finite() && !warned {
                warn!(iteration = iterations, "cost is no longer finite; the step size may be too large");
                warned = true;
            }
            trace!(iteration = iterations, cost = cost.to_f64(), "gradient descent iteration");

            let alpha = self.step.at(iterations);
            match self.stochastic {
                Some(step_count) => {
                    for _ in 0..step_count {
                        let row = [rng.gen_range(0..row_count)];
                        delegate.gradient(theta, Batch::Rows(&row), full, &mut gradient);
                        descend(theta, &gradient, alpha);
                    }
                }
                None => {
                    parallel::compute_gradient(&*delegate, theta, Batch::All, self.partitions, &mut gradient);
                    descend(theta, &gradient, alpha);
                }
            }
            iterations += 1;

            if let Stopping::Threshold(eps) = self.stopping {
                window.enqueue(cost);
                if window.approximately_close(eps) {
                    break RunState::Converged;
                }
            }
        };

        debug!(
            state = ?state,
            iterations,
            cost = final_cost.map(Float::to_f64),
            "gradient descent finished"
        );
        Ok(RunReport { state, iterations, final_cost })
    }

    /// Runs the descent on a background thread. The task's token replaces
    /// any configured cancellation token; the parameters and delegate are
    /// handed back on completion.
    pub fn spawn<D>(
        mut self,
        mut parameters: Vector<'static, T>,
        row_count: usize,
        mut delegate: D,
    ) -> Task<(Vector<'static, T>, D, RunReport<T>)>
    where
        D: OptimizationDelegate<T> + 'static,
    {
        Task::spawn(move |token| {
            self.cancel = Some(token);
            let report = self.run(&mut parameters, row_count, &mut delegate)?;
            Ok((parameters, delegate, report))
        })
    }
}

impl<T: Float> OptimizationAlgorithm<T> for GradientDescent<T> {
    fn run(
        &self,
        parameters: &mut Vector<'_, T>,
        row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
    ) -> LearnResult<RunReport<T>> {
        self.run_with_pool(parameters, row_count, delegate, T::pool())
    }
}

fn descend<T: Float>(theta: &mut [T], gradient: &[T], alpha: T) {
    for (t, &g) in theta.iter_mut().zip(gradient) {
        *t -= alpha * g;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::LinearRegression;
    use std::thread;
    use std::time::Duration;

    /// Records the cost seen at every iteration.
    struct Recording {
        inner: LinearRegression,
        costs: std::sync::Mutex<Vec<f64>>,
    }

    impl OptimizationDelegate<f64> for Recording {
        fn on_run_start(&mut self, initial: &[f64]) {
            self.inner.on_run_start(initial);
        }
        fn cost(&self, parameters: &[f64]) -> f64 {
            let c = self.inner.cost(parameters);
            self.costs.lock().unwrap().push(c);
            c
        }
        fn gradient(&self, parameters: &[f64], batch: Batch<'_>, range: IndexRange, out: &mut [f64]) {
            self.inner.gradient(parameters, batch, range, out);
        }
    }

    #[test]
    fn test_fixed_iterations_decrease_cost() {
        let mut delegate = Recording {
            inner: LinearRegression::line(),
            costs: Default::default(),
        };
        let mut params = Vector::zeros(2);
        let gd = GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(500));
        let pool = BufferPool::new();
        let report = gd.run_with_pool(&mut params, 5, &mut delegate, &pool).unwrap();

        assert_eq!(report.state, RunState::IterationLimitReached);
        assert_eq!(report.iterations, 500);
        assert_eq!(delegate.inner.runs_started, 1);

        let costs = delegate.costs.lock().unwrap();
        assert_eq!(costs.len(), 500);
        assert!(costs.windows(2).all(|w| w[1] <= w[0]));
        assert!((params[0] - 2.0).abs() < 0.1);
        assert!((params[1] - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_threshold_converges() {
        let mut delegate = LinearRegression::line();
        let mut params = Vector::zeros(2);
        let gd = GradientDescent::new(StepSize::Fixed(0.3), Stopping::Threshold(1e-10));
        let report = gd.run(&mut params, 5, &mut delegate).unwrap();

        assert_eq!(report.state, RunState::Converged);
        assert!(report.iterations >= DEFAULT_WINDOW_CAPACITY);
        assert_eq!(delegate.iterations_started, report.iterations);
        assert!((params[0] - 2.0).abs() < 1e-3);
        assert!((params[1] - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_regularization_shrinks_parameters() {
        let run = |lambda: f64| {
            let mut delegate = LinearRegression::wide(30, 4, 11).with_lambda(lambda);
            let mut params = Vector::zeros(5);
            GradientDescent::new(StepSize::Fixed(0.2), Stopping::Iterations(2000))
                .with_lambda(lambda)
                .run(&mut params, 30, &mut delegate)
                .unwrap();
            params
        };
        let plain = run(0.0);
        let ridge = run(10.0);
        // Norm over the non-bias parameters
        let norm = |p: &Vector<'_, f64>| p[1..].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!(norm(&ridge) < norm(&plain));
    }

    #[test]
    fn test_lambda_leaves_gradient_to_delegate() {
        let run = |lambda: f64| {
            let mut delegate = LinearRegression::wide(30, 4, 11).with_lambda(10.0);
            let mut params = Vector::zeros(5);
            let report = GradientDescent::new(StepSize::Fixed(0.2), Stopping::Iterations(200))
                .with_lambda(lambda)
                .run(&mut params, 30, &mut delegate)
                .unwrap();
            (params.into_vec(), report)
        };
        let (plain, plain_report) = run(0.0);
        let (ridge, ridge_report) = run(10.0);
        assert_eq!(plain, ridge);

        // Only the reported cost carries the penalty
        let penalty = Regularization::new(10.0).penalty(&ridge, 30, Some(0));
        assert!(penalty > 0.0);
        let (plain_cost, ridge_cost) = (plain_report.final_cost.unwrap(), ridge_report.final_cost.unwrap());
        assert!(ridge_cost > plain_cost);
    }

    #[test]
    fn test_stochastic_descent() {
        let mut delegate = LinearRegression::line();
        let mut params = Vector::zeros(2);
        let step = StepSize::decaying(|k| 0.2 / (1.0 + k as f64 * 0.01));
        let gd = GradientDescent::new(step, Stopping::Iterations(500))
            .with_stochastic(5)
            .with_seed(42);
        let report = gd.run(&mut params, 5, &mut delegate).unwrap();
        assert_eq!(report.iterations, 500);
        assert!((params[0] - 2.0).abs() < 0.2);
        assert!((params[1] - 3.0).abs() < 0.2);
    }

    #[test]
    fn test_partitioned_run_matches_serial() {
        let run = |partitions: usize| {
            let mut delegate = LinearRegression::wide(20, 7, 3);
            let mut params = Vector::zeros(8);
            GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(50))
                .with_partitions(partitions)
                .run(&mut params, 20, &mut delegate)
                .unwrap();
            params.into_vec()
        };
        let serial = run(1);
        let parallel = run(3);
        for (a, b) in serial.iter().zip(&parallel) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_updates_wrapped_caller_buffer() {
        let mut buffer = [0.0f64; 2];
        {
            let mut params = Vector::wrap_mut(&mut buffer);
            let mut delegate = LinearRegression::line();
            GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(10))
                .run(&mut params, 5, &mut delegate)
                .unwrap();
        }
        assert!(buffer[0] > 0.0 && buffer[1] > 0.0);
    }

    #[test]
    fn test_gradient_buffer_returns_to_pool() {
        let pool = BufferPool::new();
        let mut delegate = LinearRegression::line();
        let gd = GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(3));
        for _ in 0..3 {
            let mut params = Vector::zeros(2);
            gd.run_with_pool(&mut params, 5, &mut delegate, &pool).unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_zero_iterations() {
        let mut delegate = LinearRegression::line();
        let mut params = Vector::from_vec(vec![1.0, 1.0]);
        let report = GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(0))
            .run(&mut params, 5, &mut delegate)
            .unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.final_cost, None);
        assert_eq!(params.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_cancel_background_descent() {
        // An unreachable threshold never converges on its own
        let gd = GradientDescent::new(StepSize::Fixed(1e-12), Stopping::Threshold(1e-300));
        let task = gd.spawn(Vector::zeros(2), 5, LinearRegression::line());
        thread::sleep(Duration::from_millis(50));
        task.cancel();
        let (params, delegate, report) = task.wait().unwrap();

        assert_eq!(report.state, RunState::Cancelled);
        assert!(report.state.is_terminal());
        assert!(report.iterations > 0);
        assert_eq!(delegate.iterations_started, report.iterations);
        assert!(params.iter().all(|v| v.is_finite()));
    }

    #[test]
    #[should_panic(expected = "lambda must be non-negative")]
    fn test_negative_lambda_panics() {
        GradientDescent::new(StepSize::Fixed(0.1), Stopping::Iterations(1)).with_lambda(-1.0);
    }
}
