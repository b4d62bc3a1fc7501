//! # oxidize-learn
//!
//! Numerical optimization engine for learning algorithms, written in pure Rust.
//!
//! ## Modules
//!
//! - **core**: Float scalar trait, ownership-tracked vectors, buffer pool, cancellable tasks
//! - **linalg**: Design matrices: normalization, shuffle/split/submatrix, multiply, transpose, covariance, LU inverse
//! - **optim**: Delegate contract, gradient descent (batch/stochastic), normal equations, L-BFGS/CG adapter
//! - **search**: Golden-section and hill-climbing searches
//!
//! ## Example
//!
//! ```
//! use oxidize_learn::prelude::*;
//!
//! let search = GoldenSectionSearch::new(SearchInterval::new(0.0, 10.0)).with_tolerance(1e-6);
//! let x = search.run(|x: f64| (x - 3.0).powi(2));
//! assert!((x - 3.0).abs() < 1e-5);
//! ```

/// Scalars, vectors, buffer pool and tasks.
pub use oxidize_learn_core as core;

/// Design matrices and dense linear algebra.
pub use oxidize_learn_linalg as linalg;

/// Optimization algorithms.
pub use oxidize_learn_optim as optim;

/// Derivative-free searches.
pub use oxidize_learn_search as search;

/// The types most callers need.
pub mod prelude {
    pub use oxidize_learn_core::{CancellationToken, Float, LearnError, LearnResult, Task, Vector};
    pub use oxidize_learn_linalg::Matrix;
    pub use oxidize_learn_optim::{
        Algorithm, AlgorithmConfig, Batch, ExternalSolver, GradientDescent, IndexRange, NormalEquations,
        OptimizationAlgorithm, OptimizationDelegate, RunReport, RunState, Schedule, StepSize, Stopping,
    };
    pub use oxidize_learn_search::{GoldenSectionSearch, Goal, HillClimbingSearch, SearchInterval};
}
