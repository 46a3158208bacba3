//! A durable queue of shell commands backed by a single SQLite file, drained
//! by a pool of workers that run each job exactly once.
pub mod error;
pub mod executor;
pub mod pool;
pub mod store;
pub mod types;

pub use error::{ExecError, PoolError, StoreError};
pub use store::JobStore;
pub use types::{Job, JobStatus};
