use oxidize_learn_core::{Float, LearnError, LearnResult, Vector};
use serde::{Deserialize, Serialize};

use crate::convergence::DEFAULT_WINDOW_CAPACITY;
use crate::delegate::OptimizationDelegate;
use crate::external::{ConjugateGradient, ExternalSolver, Lbfgs, DEFAULT_ITERATION_COUNT};
use crate::gradient_descent::{GradientDescent, Stopping};
use crate::normal_equations::NormalEquations;
use crate::report::RunReport;
use crate::schedule::Schedule;

/// Common contract of every optimization strategy.
pub trait OptimizationAlgorithm<T: Float> {
    /// Optimizes `parameters` in place over `row_count` training rows.
    fn run(
        &self,
        parameters: &mut Vector<'_, T>,
        row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
    ) -> LearnResult<RunReport<T>>;
}

/// The closed set of strategies.
#[derive(Debug, Clone)]
pub enum Algorithm<T: Float> {
    GradientDescent(GradientDescent<T>),
    NormalEquations(NormalEquations),
    External(ExternalSolver<T>),
}

impl<T: Float> Algorithm<T> {
    /// L2 weight; always zero for the normal equations.
    pub fn lambda(&self) -> T {
        match self {
            Algorithm::GradientDescent(gd) => gd.lambda,
            Algorithm::NormalEquations(_) => T::ZERO,
            Algorithm::External(solver) => solver.lambda,
        }
    }

    pub fn regularization_enabled(&self) -> bool {
        self.lambda() > T::ZERO
    }
}

impl<T: Float> OptimizationAlgorithm<T> for Algorithm<T> {
    fn run(
        &self,
        parameters: &mut Vector<'_, T>,
        row_count: usize,
        delegate: &mut dyn OptimizationDelegate<T>,
    ) -> LearnResult<RunReport<T>> {
        match self {
            Algorithm::GradientDescent(gd) => gd.run(parameters, row_count, delegate),
            Algorithm::NormalEquations(ne) => ne.run(parameters, row_count, delegate),
            Algorithm::External(solver) => solver.run(parameters, row_count, delegate),
        }
    }
}

impl<T: Float> From<GradientDescent<T>> for Algorithm<T> {
    fn from(gd: GradientDescent<T>) -> Self {
        Algorithm::GradientDescent(gd)
    }
}

impl<T: Float> From<NormalEquations> for Algorithm<T> {
    fn from(ne: NormalEquations) -> Self {
        Algorithm::NormalEquations(ne)
    }
}

impl<T: Float> From<ExternalSolver<T>> for Algorithm<T> {
    fn from(solver: ExternalSolver<T>) -> Self {
        Algorithm::External(solver)
    }
}

// ─── Configuration ──────────────────────────────────────────────────────────

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn default_partitions() -> usize {
    1
}

fn default_iteration_count() -> usize {
    DEFAULT_ITERATION_COUNT
}

fn default_memory() -> usize {
    Lbfgs::default().memory
}

fn default_gradient_tolerance() -> f64 {
    Lbfgs::default().gradient_tolerance
}

/// Serializable description of an [`Algorithm`], e.g.
///
/// ```json
/// { "algorithm": "gradient_descent",
///   "step": { "kind": "constant", "rate": 0.1 },
///   "stopping": { "threshold": 1e-6 },
///   "lambda": 0.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    GradientDescent {
        step: Schedule,
        stopping: Stopping<f64>,
        #[serde(default)]
        lambda: f64,
        #[serde(default)]
        stochastic: Option<usize>,
        #[serde(default = "default_window_capacity")]
        window_capacity: usize,
        #[serde(default = "default_partitions")]
        partitions: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
    NormalEquations,
    Lbfgs {
        #[serde(default)]
        lambda: f64,
        #[serde(default = "default_iteration_count")]
        iteration_count: usize,
        #[serde(default = "default_memory")]
        memory: usize,
        #[serde(default = "default_gradient_tolerance")]
        gradient_tolerance: f64,
    },
    ConjugateGradient {
        #[serde(default)]
        lambda: f64,
        #[serde(default = "default_iteration_count")]
        iteration_count: usize,
        #[serde(default = "default_gradient_tolerance")]
        gradient_tolerance: f64,
    },
}

fn invalid(message: impl Into<String>) -> LearnError {
    LearnError::InvalidConfig(message.into())
}

fn check_lambda(lambda: f64) -> LearnResult<()> {
    if lambda >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("lambda must be non-negative, got {}", lambda)))
    }
}

fn check_non_zero(value: usize, name: &str) -> LearnResult<()> {
    if value == 0 {
        Err(invalid(format!("{} must be non-zero", name)))
    } else {
        Ok(())
    }
}

impl AlgorithmConfig {
    pub fn from_json(json: &str) -> LearnResult<Self> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    pub fn to_json(&self) -> LearnResult<String> {
        serde_json::to_string(self).map_err(|e| invalid(e.to_string()))
    }

    /// Validates the configuration and builds the runnable algorithm.
    pub fn build<T: Float>(&self) -> LearnResult<Algorithm<T>> {
        match *self {
            AlgorithmConfig::GradientDescent {
                step,
                stopping,
                lambda,
                stochastic,
                window_capacity,
                partitions,
                seed,
            } => {
                check_lambda(lambda)?;
                check_non_zero(window_capacity, "window_capacity")?;
                check_non_zero(partitions, "partitions")?;
                let stopping = match stopping {
                    Stopping::Iterations(n) => Stopping::Iterations(n),
                    Stopping::Threshold(eps) if eps > 0.0 => Stopping::Threshold(T::from_f64(eps)),
                    Stopping::Threshold(eps) => {
                        return Err(invalid(format!("threshold must be positive, got {}", eps)))
                    }
                };

                let mut gd = GradientDescent::new(step.into(), stopping)
                    .with_lambda(T::from_f64(lambda))
                    .with_window_capacity(window_capacity)
                    .with_partitions(partitions);
                if let Some(step_count) = stochastic {
                    check_non_zero(step_count, "stochastic")?;
                    gd = gd.with_stochastic(step_count);
                }
                gd.seed = seed;
                Ok(gd.into())
            }
            AlgorithmConfig::NormalEquations => Ok(NormalEquations.into()),
            AlgorithmConfig::Lbfgs {
                lambda,
                iteration_count,
                memory,
                gradient_tolerance,
            } => {
                check_lambda(lambda)?;
                check_non_zero(iteration_count, "iteration_count")?;
                check_non_zero(memory, "memory")?;
                let minimizer = Lbfgs {
                    memory,
                    gradient_tolerance,
                    ..Lbfgs::default()
                };
                Ok(ExternalSolver::new(minimizer)
                    .with_lambda(T::from_f64(lambda))
                    .with_iteration_count(iteration_count)
                    .into())
            }
            AlgorithmConfig::ConjugateGradient {
                lambda,
                iteration_count,
                gradient_tolerance,
            } => {
                check_lambda(lambda)?;
                check_non_zero(iteration_count, "iteration_count")?;
                let minimizer = ConjugateGradient {
                    gradient_tolerance,
                    ..ConjugateGradient::default()
                };
                Ok(ExternalSolver::new(minimizer)
                    .with_lambda(T::from_f64(lambda))
                    .with_iteration_count(iteration_count)
                    .into())
            }
        }
    }
}
