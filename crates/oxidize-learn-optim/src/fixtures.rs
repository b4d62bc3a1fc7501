//! Least-squares delegate shared by the unit tests.

use oxidize_learn_linalg::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::delegate::{Batch, IndexRange, OptimizationDelegate};
use crate::regularization::Regularization;

pub struct LinearRegression {
    pub matrix: Matrix<f64>,
    /// Ridge weight folded into the gradient.
    pub lambda: f64,
    pub runs_started: usize,
    pub iterations_started: usize,
}

impl LinearRegression {
    pub fn new(rows: &[Vec<f64>], output: &[f64]) -> Self {
        LinearRegression {
            matrix: Matrix::from_rows(rows, Some(output), true).unwrap(),
            lambda: 0.0,
            runs_started: 0,
            iterations_started: 0,
        }
    }

    /// `y = 2 + 3x` on x = 0..5, no noise.
    pub fn line() -> Self {
        let rows: Vec<Vec<f64>> = (0..5).map(|x| vec![x as f64 * 0.5]).collect();
        let output: Vec<f64> = rows.iter().map(|r| 2.0 + 3.0 * r[0]).collect();
        LinearRegression::new(&rows, &output)
    }

    /// Random features with a noisy linear target.
    pub fn wide(rows: usize, features: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights: Vec<f64> = (0..features).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let data: Vec<Vec<f64>> = (0..rows)
            .map(|_| (0..features).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let output: Vec<f64> = data
            .iter()
            .map(|x| {
                let signal: f64 = x.iter().zip(&weights).map(|(a, w)| a * w).sum();
                1.0 + signal + rng.gen_range(-0.1..0.1)
            })
            .collect();
        LinearRegression::new(&data, &output)
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    fn residual(&self, parameters: &[f64], row: usize) -> f64 {
        let x = self.matrix.row(row);
        let h: f64 = x.iter().zip(parameters).map(|(a, t)| a * t).sum();
        h - self.matrix.output().unwrap()[row]
    }
}

impl OptimizationDelegate<f64> for LinearRegression {
    fn on_run_start(&mut self, _initial: &[f64]) {
        self.runs_started += 1;
    }

    fn on_iteration_start(&mut self) {
        self.iterations_started += 1;
    }

    fn cost(&self, parameters: &[f64]) -> f64 {
        let m = self.matrix.row_count();
        let sum: f64 = (0..m).map(|i| self.residual(parameters, i).powi(2)).sum();
        sum / (2.0 * m as f64)
    }

    fn gradient(&self, parameters: &[f64], batch: Batch<'_>, range: IndexRange, out: &mut [f64]) {
        out.iter_mut().for_each(|g| *g = 0.0);
        let all: Vec<usize>;
        let rows: &[usize] = match batch {
            Batch::All => {
                all = (0..self.matrix.row_count()).collect();
                &all
            }
            Batch::Rows(rows) => rows,
        };
        for &i in rows {
            let err = self.residual(parameters, i);
            let x = self.matrix.row(i);
            for (k, g) in out.iter_mut().enumerate() {
                *g += err * x[range.start + k];
            }
        }
        let count = rows.len() as f64;
        out.iter_mut().for_each(|g| *g /= count);
        Regularization::new(self.lambda).apply_to_gradient(
            parameters,
            self.matrix.row_count(),
            self.bias_index(),
            range,
            out,
        );
    }

    fn design_matrix(&self) -> Option<&Matrix<f64>> {
        Some(&self.matrix)
    }
}
