use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{LearnError, LearnResult};

/// Cooperative cancellation flag shared between a worker and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> LearnResult<()> {
        if self.is_cancelled() {
            Err(LearnError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A unit of work running on its own thread.
///
/// The closure receives the task's token and is expected to poll it between
/// iterations. Synchronous callers simply `wait`.
pub struct Task<R> {
    token: CancellationToken,
    handle: JoinHandle<LearnResult<R>>,
}

impl<R: Send + 'static> Task<R> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> LearnResult<R> + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || work(worker_token));
        Task { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the work completes.
    pub fn wait(self) -> LearnResult<R> {
        self.handle.join().map_err(|_| LearnError::TaskPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_task_returns_result() {
        let task = Task::spawn(|_token| Ok(21 * 2));
        assert_eq!(task.wait().unwrap(), 42);
    }

    #[test]
    fn test_task_cancellation() {
        let task = Task::spawn(|token: CancellationToken| {
            let mut spins = 0u64;
            loop {
                token.check()?;
                spins += 1;
                thread::sleep(Duration::from_millis(1));
                if spins > 60_000 {
                    return Ok(spins);
                }
            }
        });
        task.cancel();
        assert_eq!(task.wait(), Err(LearnError::Cancelled));
    }

    #[test]
    fn test_task_panic_is_reported() {
        let task: Task<()> = Task::spawn(|_token| panic!("worker failed"));
        assert_eq!(task.wait(), Err(LearnError::TaskPanicked));
    }
}
