//! Adapter between the delegate contract and an external minimization
//! routine, plus two bundled quasi-Newton style minimizers.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use oxidize_learn_core::{CancellationToken, Float, LearnError, LearnResult, Vector};
use tracing::{debug, warn};

use crate::algorithm::OptimizationAlgorithm;
use crate::delegate::{Batch, IndexRange, OptimizationDelegate};
use crate::regularization::Regularization;
use crate::report::{RunReport, RunState};

pub const DEFAULT_ITERATION_COUNT: usize = 100;

// ─── Solver-side calling convention ─────────────────────────────────────────

/// Objective as seen by a [`Minimizer`]: cost and full gradient at `x`.
pub trait Objective<T: Float> {
    fn cost(&mut self, x: &[T]) -> T;

    fn gradient(&mut self, x: &[T], out: &mut [T]);

    /// Called by the minimizer at the start of each of its iterations.
    fn iteration_started(&mut self) {}
}

/// A numerical minimization routine.
///
/// Returns a vector the length of `initial`, `Err(DidNotConverge)` when its
/// own limits are exhausted, or `Err(Cancelled)` once `cancel` fires.
pub trait Minimizer<T: Float>: fmt::Debug + Send + Sync {
    fn minimize(
        &self,
        initial: &[T],
        objective: &mut dyn Objective<T>,
        max_iterations: usize,
        cancel: Option<&CancellationToken>,
    ) -> LearnResult<Vec<T>>;
}

/// Forwards an [`Objective`] to a delegate. The L2 penalty is added to the
/// cost; the gradient is passed through as the delegate computes it.
pub struct DelegateObjective<'d, T: Float> {
    delegate: &'d mut dyn OptimizationDelegate<T>,
    regularization: Regularization<T>,
    rows: usize,
    bias: Option<usize>,
    iterations: usize,
}

impl<'d, T: Float> DelegateObjective<'d, T> {
    pub fn new(delegate: &'d mut dyn OptimizationDelegate<T>, lambda: T, rows: usize) -> Self {
        let bias = delegate.bias_index();
        DelegateObjective {
            delegate,
            regularization: Regularization::new(lambda),
            rows,
            bias,
            iterations: 0,
        }
    }

    /// Iterations the minimizer has started so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl<T: Float> Objective<T> for DelegateObjective<'_, T> {
    fn cost(&mut self, x: &[T]) -> T {
        self.delegate.cost(x) + self.regularization.penalty(x, self.rows, self.bias)
    }

    fn gradient(&mut self, x: &[T], out: &mut [T]) {
        self.delegate.gradient(x, Batch::All, IndexRange::full(x.len()), out);
    }

    fn iteration_started(&mut self) {
        self.iterations += 1;
        self.delegate.on_iteration_start();
    }
}

// ─── Adapter ────────────────────────────────────────────────────────────────

/// Runs a [`Minimizer`] against a delegate.
///
/// The parameter vector is only written when the minimizer succeeds; a
/// failed or cancelled run leaves it at its initial value.
#[derive(Debug, Clone)]
pub struct ExternalSolver<T: Float> {
    pub lambda: T,
    pub iteration_count: usize,
    pub minimizer: Arc<dyn Minimizer<T>>,
    pub cancel: Option<CancellationToken>,
}

impl<T: Float> ExternalSolver<T> {
    pub fn new<M: Minimizer<T> + 'static>(minimizer: M) -> Self {
        ExternalSolver {
            lambda: T::ZERO,
            iteration_count: DEFAULT_ITERATION_COUNT,
            minimizer: Arc::new(minimizer),
            cancel: None,
        }
    }

    pub fn lbfgs() -> Self {
        ExternalSolver::new(Lbfgs::default())
    }

    pub fn conjugate_gradient() -> Self {
        ExternalSolver::new(ConjugateGradient::default())
    }

    /// # Panics
    /// If `lambda` is negative.
    pub fn with_lambda(mut self, lambda: T) -> Self {
        assert!(lambda >= T::ZERO, "lambda must be non-negative, got {}", lambda);
        self.lambda = lambda;
        self
    }

    pub fn with_iteration_count(mut self, iteration_count: usize) -> Self {
        assert!(iteration_count > 0, "iteration count must be non-zero");
        self.iteration_count = iteration_count;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<T: Float> OptimizationAlgorithm<T> for ExternalSolver<T> {
    fn run(
        &self,
        parameters: &mut Vector<'_, T>,
        row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
    ) -> LearnResult<RunReport<T>> {
        assert!(!parameters.is_empty(), "parameter vector must be non-empty");
        assert!(row_count > 0, "row count must be non-zero");

        delegate.on_run_start(parameters.as_slice());
        let mut objective = DelegateObjective::new(delegate, self.lambda, row_count);
        let outcome = self.minimizer.minimize(
            parameters.as_slice(),
            &mut objective,
            self.iteration_count,
            self.cancel.as_ref(),
        );
        let iterations = objective.iterations();

        let solution = match outcome {
            Ok(x) => x,
            Err(LearnError::Cancelled) => {
                return Ok(RunReport {
                    state: RunState::Cancelled,
                    iterations,
                    final_cost: None,
                })
            }
            Err(e) => {
                warn!(minimizer = ?self.minimizer, error = %e, "external minimizer failed");
                return Err(e);
            }
        };
        if solution.len() != parameters.len() {
            return Err(LearnError::DimensionMismatch(format!(
                "minimizer returned {} values for {} parameters",
                solution.len(),
                parameters.len()
            )));
        }

        let cost = objective.cost(&solution);
        parameters.make_mut().copy_from_slice(&solution);
        debug!(iterations, cost = cost.to_f64(), "external minimizer converged");

        Ok(RunReport {
            state: RunState::Converged,
            iterations,
            final_cost: Some(cost),
        })
    }
}

// ─── Bundled minimizers ─────────────────────────────────────────────────────

fn dot<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

fn norm<T: Float>(a: &[T]) -> T {
    dot(a, a).sqrt()
}

/// Backtracking line search with the Armijo condition, starting at `alpha`.
/// Returns `(alpha, x_new, f_new)` or `None` if no acceptable step was found.
fn backtracking<T: Float>(
    objective: &mut dyn Objective<T>,
    x: &[T],
    fx: T,
    grad: &[T],
    direction: &[T],
    mut alpha: T,
) -> Option<(T, Vec<T>, T)> {
    let c = T::from_f64(1e-4);
    let slope = dot(grad, direction);

    for _ in 0..50 {
        let x_new: Vec<T> = x.iter().zip(direction).map(|(&a, &d)| a + alpha * d).collect();
        let f_new = objective.cost(&x_new);
        if f_new.is_finite() && f_new <= fx + c * alpha * slope {
            return Some((alpha, x_new, f_new));
        }
        alpha *= T::HALF;
    }
    None
}

fn converged<T: Float>(fx: T, f_new: T, tolerance: f64) -> bool {
    let scale = fx.abs().max(f_new.abs()).max(T::ONE);
    (fx - f_new).abs() <= T::from_f64(tolerance) * scale
}

/// Limited-memory BFGS with a two-loop recursion and backtracking line
/// search.
///
/// # Panics
/// `minimize` panics if `memory` is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lbfgs {
    /// Correction pairs kept.
    pub memory: usize,
    /// Stop once the gradient norm drops below this.
    pub gradient_tolerance: f64,
    /// Stop once the relative cost decrease drops below this.
    pub cost_tolerance: f64,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Lbfgs {
            memory: 10,
            gradient_tolerance: 1e-6,
            cost_tolerance: 1e-14,
        }
    }
}

impl Lbfgs {
    fn direction<T: Float>(&self, grad: &[T], history: &VecDeque<(Vec<T>, Vec<T>, T)>) -> Vec<T> {
        let mut q = grad.to_vec();
        let mut alphas = Vec::with_capacity(history.len());

        for (s, y, rho) in history.iter().rev() {
            let a = *rho * dot(s, &q);
            for (qi, &yi) in q.iter_mut().zip(y) {
                *qi -= a * yi;
            }
            alphas.push(a);
        }

        if let Some((s, y, _)) = history.back() {
            let gamma = dot(s, y) / dot(y, y);
            q.iter_mut().for_each(|v| *v *= gamma);
        }

        for ((s, y, rho), &a) in history.iter().zip(alphas.iter().rev()) {
            let b = *rho * dot(y, &q);
            for (qi, &si) in q.iter_mut().zip(s) {
                *qi += si * (a - b);
            }
        }

        q.iter_mut().for_each(|v| *v = -*v);
        q
    }
}

impl<T: Float> Minimizer<T> for Lbfgs {
    fn minimize(
        &self,
        initial: &[T],
        objective: &mut dyn Objective<T>,
        max_iterations: usize,
        cancel: Option<&CancellationToken>,
    ) -> LearnResult<Vec<T>> {
        assert!(self.memory > 0, "L-BFGS memory must be non-zero");
        let n = initial.len();
        let g_tol = T::from_f64(self.gradient_tolerance);
        let mut history: VecDeque<(Vec<T>, Vec<T>, T)> = VecDeque::with_capacity(self.memory);

        let mut x = initial.to_vec();
        let mut fx = objective.cost(&x);
        let mut grad = vec![T::ZERO; n];
        objective.gradient(&x, &mut grad);

        for _ in 0..max_iterations {
            if let Some(token) = cancel {
                token.check()?;
            }
            let grad_norm = norm(&grad);
            if grad_norm < g_tol {
                return Ok(x);
            }
            objective.iteration_started();

            let d = self.direction(&grad, &history);
            let alpha = if history.is_empty() {
                (T::ONE / grad_norm).min(T::ONE)
            } else {
                T::ONE
            };

            let (_, x_new, f_new) = match backtracking(objective, &x, fx, &grad, &d, alpha) {
                Some(step) => step,
                // Curvature pairs went stale; retry from steepest descent
                None if !history.is_empty() => {
                    history.clear();
                    continue;
                }
                None => return Err(LearnError::NumericalError("L-BFGS line search failed".into())),
            };

            let mut grad_new = vec![T::ZERO; n];
            objective.gradient(&x_new, &mut grad_new);

            let s: Vec<T> = x_new.iter().zip(&x).map(|(&a, &b)| a - b).collect();
            let y: Vec<T> = grad_new.iter().zip(&grad).map(|(&a, &b)| a - b).collect();
            let sy = dot(&s, &y);
            if sy > T::EPSILON {
                if history.len() >= self.memory {
                    history.pop_front();
                }
                history.push_back((s, y, T::ONE / sy));
            }

            let done = converged(fx, f_new, self.cost_tolerance);
            x = x_new;
            fx = f_new;
            grad = grad_new;
            if done {
                return Ok(x);
            }
        }

        if norm(&grad) < g_tol {
            return Ok(x);
        }
        Err(LearnError::DidNotConverge { iterations: max_iterations })
    }
}

/// Nonlinear conjugate gradient (Polak–Ribière+) with restarts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConjugateGradient {
    pub gradient_tolerance: f64,
    pub cost_tolerance: f64,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        ConjugateGradient {
            gradient_tolerance: 1e-6,
            cost_tolerance: 1e-14,
        }
    }
}

impl<T: Float> Minimizer<T> for ConjugateGradient {
    fn minimize(
        &self,
        initial: &[T],
        objective: &mut dyn Objective<T>,
        max_iterations: usize,
        cancel: Option<&CancellationToken>,
    ) -> LearnResult<Vec<T>> {
        let n = initial.len();
        let g_tol = T::from_f64(self.gradient_tolerance);

        let mut x = initial.to_vec();
        let mut fx = objective.cost(&x);
        let mut grad = vec![T::ZERO; n];
        objective.gradient(&x, &mut grad);

        // Initial direction is negative gradient
        let mut p: Vec<T> = grad.iter().map(|&g| -g).collect();
        let mut grad_norm_sq = dot(&grad, &grad);
        let mut alpha = (T::ONE / grad_norm_sq.sqrt().max(T::EPSILON)).min(T::ONE);

        for iter in 0..max_iterations {
            if let Some(token) = cancel {
                token.check()?;
            }
            if grad_norm_sq.sqrt() < g_tol {
                return Ok(x);
            }
            objective.iteration_started();

            // Start from twice the last accepted step
            let (accepted, x_new, f_new) = match backtracking(objective, &x, fx, &grad, &p, alpha * T::TWO) {
                Some(step) => step,
                None => {
                    return Err(LearnError::NumericalError(
                        "conjugate gradient line search failed".into(),
                    ))
                }
            };
            alpha = accepted;

            let mut grad_new = vec![T::ZERO; n];
            objective.gradient(&x_new, &mut grad_new);

            let grad_new_norm_sq = dot(&grad_new, &grad_new);
            let grad_diff_dot_new: T = grad_new.iter().zip(&grad).map(|(&gn, &g)| gn * (gn - g)).sum();
            let mut beta = (grad_diff_dot_new / grad_norm_sq).max(T::ZERO);
            // Periodic restart
            if (iter + 1) % n.max(1) == 0 {
                beta = T::ZERO;
            }
            for (pi, &gi) in p.iter_mut().zip(&grad_new) {
                *pi = -gi + beta * *pi;
            }
            // Restart if direction is not descent
            if dot(&grad_new, &p) >= T::ZERO {
                for (pi, &gi) in p.iter_mut().zip(&grad_new) {
                    *pi = -gi;
                }
            }

            let done = converged(fx, f_new, self.cost_tolerance);
            x = x_new;
            fx = f_new;
            grad = grad_new;
            grad_norm_sq = grad_new_norm_sq;
            if done {
                return Ok(x);
            }
        }

        if grad_norm_sq.sqrt() < g_tol {
            return Ok(x);
        }
        Err(LearnError::DidNotConverge { iterations: max_iterations })
    }
}
