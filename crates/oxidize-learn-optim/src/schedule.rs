use std::fmt;
use std::sync::Arc;

use oxidize_learn_core::Float;
use serde::{Deserialize, Serialize};

/// Step size (learning rate) used by gradient descent at each iteration.
///
/// A decaying step should be non-increasing for the usual convergence
/// guarantees, but this is not checked.
#[derive(Clone)]
pub enum StepSize<T: Float> {
    Fixed(T),
    Decaying(Arc<dyn Fn(usize) -> T + Send + Sync>),
}

impl<T: Float> StepSize<T> {
    pub fn decaying<F>(f: F) -> Self
    where
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        StepSize::Decaying(Arc::new(f))
    }

    pub fn at(&self, iteration: usize) -> T {
        match self {
            StepSize::Fixed(alpha) => *alpha,
            StepSize::Decaying(f) => f(iteration),
        }
    }
}

impl<T: Float> fmt::Debug for StepSize<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSize::Fixed(alpha) => f.debug_tuple("Fixed").field(alpha).finish(),
            StepSize::Decaying(_) => f.write_str("Decaying(..)"),
        }
    }
}

impl<T: Float> From<Schedule> for StepSize<T> {
    fn from(schedule: Schedule) -> Self {
        match schedule {
            Schedule::Constant { rate } => StepSize::Fixed(T::from_f64(rate)),
            other => StepSize::decaying(move |k| T::from_f64(other.rate(k))),
        }
    }
}

/// Named step-size schedules that can be loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    Constant { rate: f64 },
    /// Multiply by `gamma` every `step_size` iterations.
    Step { initial: f64, step_size: usize, gamma: f64 },
    /// `initial · gamma^k`
    Exponential { initial: f64, gamma: f64 },
    /// `initial / (1 + decay · k)`
    InverseTime { initial: f64, decay: f64 },
    /// Cosine annealing from `initial` down to `min` over `period`
    /// iterations, then held at `min`.
    Cosine { initial: f64, min: f64, period: usize },
}

impl Schedule {
    pub fn rate(&self, iteration: usize) -> f64 {
        match *self {
            Schedule::Constant { rate } => rate,
            Schedule::Step { initial, step_size, gamma } => {
                initial * gamma.powi((iteration / step_size.max(1)) as i32)
            }
            Schedule::Exponential { initial, gamma } => initial * gamma.powi(iteration as i32),
            Schedule::InverseTime { initial, decay } => initial / (1.0 + decay * iteration as f64),
            Schedule::Cosine { initial, min, period } => {
                let progress = iteration.min(period) as f64 / period.max(1) as f64;
                min + 0.5 * (initial - min) * (1.0 + (std::f64::consts::PI * progress).cos())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_and_closure() {
        let fixed = StepSize::Fixed(0.1f64);
        assert_eq!(fixed.at(0), 0.1);
        assert_eq!(fixed.at(1000), 0.1);

        let decaying = StepSize::decaying(|k| 1.0f64 / (k + 1) as f64);
        assert_eq!(decaying.at(0), 1.0);
        assert_eq!(decaying.at(3), 0.25);
    }

    #[test]
    fn test_step_schedule() {
        let sched = Schedule::Step { initial: 0.1, step_size: 10, gamma: 0.5 };
        assert!((sched.rate(0) - 0.1).abs() < 1e-10);
        assert!((sched.rate(10) - 0.05).abs() < 1e-10);
        assert!((sched.rate(25) - 0.025).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_schedule() {
        let sched = Schedule::Cosine { initial: 0.1, min: 0.0, period: 100 };
        assert!((sched.rate(0) - 0.1).abs() < 1e-10);
        assert!(sched.rate(50) < 0.06 && sched.rate(50) > 0.04);
        assert!(sched.rate(100) < 1e-10);
        assert!(sched.rate(500) < 1e-10);
    }

    #[test]
    fn test_schedule_into_step_size() {
        let step: StepSize<f64> = Schedule::InverseTime { initial: 1.0, decay: 1.0 }.into();
        assert!(matches!(step, StepSize::Decaying(_)));
        assert!((step.at(1) - 0.5).abs() < 1e-12);

        let constant: StepSize<f32> = Schedule::Constant { rate: 0.25 }.into();
        assert!(matches!(constant, StepSize::Fixed(r) if r == 0.25));
    }

    #[test]
    fn test_schedule_from_json() {
        let sched: Schedule =
            serde_json::from_str(r#"{"kind": "exponential", "initial": 1.0, "gamma": 0.5}"#).unwrap();
        assert_eq!(sched, Schedule::Exponential { initial: 1.0, gamma: 0.5 });
        assert!((sched.rate(2) - 0.25).abs() < 1e-12);
    }
}
