pub mod algorithm;
pub mod convergence;
pub mod delegate;
pub mod external;
pub mod gradient_descent;
pub mod normal_equations;
pub mod parallel;
pub mod regularization;
pub mod report;
pub mod schedule;

#[cfg(test)]
mod fixtures;

pub use algorithm::{Algorithm, AlgorithmConfig, OptimizationAlgorithm};
pub use convergence::ConvergenceWindow;
pub use delegate::{Batch, IndexRange, OptimizationDelegate};
pub use external::{ConjugateGradient, DelegateObjective, ExternalSolver, Lbfgs, Minimizer, Objective};
pub use gradient_descent::{GradientDescent, Stopping};
pub use normal_equations::NormalEquations;
pub use regularization::Regularization;
pub use report::{RunReport, RunState};
pub use schedule::{Schedule, StepSize};
