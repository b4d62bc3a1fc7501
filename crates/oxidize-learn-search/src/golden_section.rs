use oxidize_learn_core::{CancellationToken, Float, LearnResult, Task};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Closed interval `[start, end]` of a univariate search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct SearchInterval<T: Float> {
    pub start: T,
    pub end: T,
}

impl<T: Float> SearchInterval<T> {
    pub fn new(start: T, end: T) -> Self {
        SearchInterval { start, end }
    }

    pub fn width(&self) -> T {
        self.end - self.start
    }

    pub fn midpoint(&self) -> T {
        (self.start + self.end) * T::HALF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    Minimize,
    Maximize,
}

/// Golden-section search for the extremum of a unimodal function.
///
/// The bracket shrinks by the inverse golden ratio each iteration until its
/// width falls below `tolerance`; the result is the final midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldenSectionSearch<T: Float> {
    pub interval: SearchInterval<T>,
    pub tolerance: T,
    pub goal: Goal,
}

impl<T: Float> GoldenSectionSearch<T> {
    /// # Panics
    /// If the interval is empty or reversed.
    pub fn new(interval: SearchInterval<T>) -> Self {
        assert!(
            interval.start < interval.end,
            "search interval [{}, {}] must have start < end",
            interval.start,
            interval.end
        );
        GoldenSectionSearch {
            interval,
            tolerance: T::from_f64(DEFAULT_TOLERANCE),
            goal: Goal::Minimize,
        }
    }

    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        assert!(tolerance > T::ZERO, "tolerance must be positive, got {}", tolerance);
        self.tolerance = tolerance;
        self
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = goal;
        self
    }

    pub fn maximize(self) -> Self {
        self.with_goal(Goal::Maximize)
    }

    pub fn run<F: Fn(T) -> T>(&self, f: F) -> T {
        match self.search(f, None) {
            Ok(x) => x,
            // Only cancellation fails, and there is no token here
            Err(_) => self.interval.midpoint(),
        }
    }

    /// Like [`run`](Self::run), but polls `token` every iteration.
    pub fn run_with_cancel<F: Fn(T) -> T>(&self, f: F, token: &CancellationToken) -> LearnResult<T> {
        self.search(f, Some(token))
    }

    /// Runs the search on a background thread.
    pub fn spawn<F>(self, f: F) -> Task<T>
    where
        F: Fn(T) -> T + Send + 'static,
    {
        Task::spawn(move |token| self.search(f, Some(&token)))
    }

    fn search<F: Fn(T) -> T>(&self, f: F, token: Option<&CancellationToken>) -> LearnResult<T> {
        let inv_phi = T::from_f64((5.0f64.sqrt() - 1.0) / 2.0);
        let inv_phi2 = T::ONE - inv_phi;
        let better = |a: T, b: T| match self.goal {
            Goal::Minimize => a < b,
            Goal::Maximize => a > b,
        };

        let SearchInterval { start: mut a, end: mut b } = self.interval;
        let mut x1 = a + inv_phi2 * (b - a);
        let mut x2 = a + inv_phi * (b - a);
        let mut f1 = f(x1);
        let mut f2 = f(x2);
        let mut iterations = 0usize;

        loop {
            let width = b - a;
            if width < self.tolerance {
                break;
            }
            if let Some(token) = token {
                token.check()?;
            }

            if better(f1, f2) {
                b = x2;
                x2 = x1;
                f2 = f1;
                x1 = a + inv_phi2 * (b - a);
                f1 = f(x1);
            } else {
                a = x1;
                x1 = x2;
                f1 = f2;
                x2 = a + inv_phi * (b - a);
                f2 = f(x2);
            }
            iterations += 1;

            // Floating point resolution reached before the tolerance
            if b - a >= width {
                break;
            }
        }

        let x = (a + b) * T::HALF;
        debug!(iterations, x = x.to_f64(), width = (b - a).to_f64(), "golden section search finished");
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_minimize_parabola() {
        let search = GoldenSectionSearch::new(SearchInterval::new(0.0, 10.0)).with_tolerance(1e-6);
        let x = search.run(|x: f64| (x - 3.0).powi(2));
        assert_abs_diff_eq!(x, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_maximize() {
        let search = GoldenSectionSearch::new(SearchInterval::new(-4.0, 4.0)).maximize();
        let x = search.run(|x: f64| 1.0 - (x - 1.5).powi(2));
        assert_abs_diff_eq!(x, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_default_tolerance_terminates() {
        // f64 spacing near 1e9 is wider than the default tolerance
        let search = GoldenSectionSearch::new(SearchInterval::new(1e9, 1e9 + 1.0));
        let x = search.run(|x: f64| (x - (1e9 + 0.25)).abs());
        assert_abs_diff_eq!(x, 1e9 + 0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_run_in_background() {
        let task = GoldenSectionSearch::new(SearchInterval::new(0.0f64, 2.0)).spawn(|x| (x - 0.5).powi(2));
        assert_abs_diff_eq!(task.wait().unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let search = GoldenSectionSearch::new(SearchInterval::new(0.0f64, 2.0));
        assert_eq!(
            search.run_with_cancel(|x| x * x, &token),
            Err(oxidize_learn_core::LearnError::Cancelled)
        );
    }

    #[test]
    #[should_panic(expected = "must have start < end")]
    fn test_reversed_interval() {
        GoldenSectionSearch::new(SearchInterval::new(1.0f64, 0.0));
    }

    #[test]
    fn test_interval_serde() {
        let interval = SearchInterval::new(0.5f64, 2.0);
        let json = serde_json::to_string(&interval).unwrap();
        assert_eq!(json, r#"{"start":0.5,"end":2.0}"#);
        let back: SearchInterval<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, interval);
    }
}
