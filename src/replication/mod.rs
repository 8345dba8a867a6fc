//! Replication Executor and its supporting types.

pub mod executor;
pub mod id_map;
pub mod observer;
pub mod report;
pub mod retry;

pub use executor::{ExecutorOptions, ReplicationExecutor};
pub use id_map::IdMap;
pub use observer::{CancellationFlag, NoopObserver, ReplicationObserver};
pub use report::{ExecutorState, FailureReason, NodeFailure, ReplicationResult, StepOutcome};
pub use retry::{RetryConfig, RetryPolicy};
