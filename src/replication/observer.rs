//! Progress hooks and cooperative cancellation for a run.

use crate::error::GatewayError;
use crate::plan::PlanStep;
use crate::replication::report::StepOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Receives progress events from the executor.
///
/// `index` is the step's position in the plan. All methods default to no-ops.
pub trait ReplicationObserver: Send + Sync {
    fn on_run_started(&self, _total_steps: usize) {}

    fn on_step_started(&self, _index: usize, _step: &PlanStep) {}

    fn on_step_completed(&self, _index: usize, _step: &PlanStep, _outcome: &StepOutcome) {}

    fn on_retry(&self, _step: &PlanStep, _attempt: u32, _error: &GatewayError, _delay: Duration) {}
}

pub struct NoopObserver;

impl ReplicationObserver for NoopObserver {}

/// Shared flag checked between steps; cancelling never interrupts an in-flight call.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
