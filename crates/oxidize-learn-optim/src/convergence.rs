use std::collections::VecDeque;

use oxidize_learn_core::Float;

pub const DEFAULT_WINDOW_CAPACITY: usize = 5;

/// Bounded FIFO of the most recent objective values.
///
/// Enqueueing into a full window evicts the oldest value.
#[derive(Debug, Clone)]
pub struct ConvergenceWindow<T: Float> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T: Float> ConvergenceWindow<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "convergence window capacity must be non-zero");
        ConvergenceWindow {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.values.pop_front()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// True when the window is full and every pair of adjacent values
    /// differs by strictly less than `threshold`.
    pub fn approximately_close(&self, threshold: T) -> bool {
        self.is_full()
            && self
                .values
                .iter()
                .zip(self.values.iter().skip(1))
                .all(|(&a, &b)| (b - a).abs() < threshold)
    }
}

impl<T: Float> Default for ConvergenceWindow<T> {
    fn default() -> Self {
        ConvergenceWindow::new(DEFAULT_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(values: &[f64]) -> ConvergenceWindow<f64> {
        let mut w = ConvergenceWindow::new(values.len());
        values.iter().for_each(|&v| w.enqueue(v));
        w
    }

    #[test]
    fn test_close_values() {
        assert!(window(&[10.0, 10.005, 10.008]).approximately_close(0.01));
    }

    #[test]
    fn test_diverging_values() {
        assert!(!window(&[10.0, 10.5, 9.0]).approximately_close(0.01));
    }

    #[test]
    fn test_partial_window_is_never_close() {
        let mut w = ConvergenceWindow::new(3);
        w.enqueue(1.0);
        w.enqueue(1.0);
        assert!(!w.approximately_close(0.1));
        w.enqueue(1.0);
        assert!(w.approximately_close(0.1));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut w: ConvergenceWindow<f64> = ConvergenceWindow::default();
        for i in 0..8 {
            w.enqueue(i as f64);
        }
        assert!(w.is_full());
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(w.dequeue(), Some(3.0));
        assert_eq!(w.len(), 4);
        w.clear();
        assert!(w.is_empty());
    }
}
