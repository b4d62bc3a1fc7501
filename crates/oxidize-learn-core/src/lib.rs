pub mod dtype;
pub mod error;
pub mod pool;
pub mod task;
pub mod vector;

pub use dtype::Float;
pub use error::{LearnError, LearnResult};
pub use pool::{BufferPool, PoolStats, PooledBuffer};
pub use task::{CancellationToken, Task};
pub use vector::{Ownership, Vector};
