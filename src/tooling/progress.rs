//! Console progress for interactive runs.

use crate::error::GatewayError;
use crate::plan::PlanStep;
use crate::replication::{ReplicationObserver, StepOutcome};
use crate::tree::NodeKind;
use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Prints one line per finished step to stderr.
#[derive(Default)]
pub struct ConsoleProgress {
    total: AtomicUsize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, index: usize, step: &PlanStep, outcome: &StepOutcome) -> String {
        let total = self.total.load(Ordering::Relaxed);
        let what = match step.kind {
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
        };
        let status = match outcome {
            StepOutcome::Created { .. } => format!("{}", "✓".green()),
            StepOutcome::Failed { .. } => format!("{}", "✗".red()),
        };
        let mut line = format!("[{}/{}] {} {} {}", index + 1, total, status, what, step.name);
        if let StepOutcome::Failed { reason, .. } = outcome {
            line.push_str(&format!(" ({})", reason));
        }
        line
    }
}

impl ReplicationObserver for ConsoleProgress {
    fn on_run_started(&self, total_steps: usize) {
        self.total.store(total_steps, Ordering::Relaxed);
        eprintln!("{}", format!("Replicating {} items...", total_steps).blue());
    }

    fn on_step_completed(&self, index: usize, step: &PlanStep, outcome: &StepOutcome) {
        eprintln!("{}", self.line(index, step, outcome));
    }

    fn on_retry(&self, step: &PlanStep, attempt: u32, error: &GatewayError, delay: Duration) {
        eprintln!(
            "{}",
            format!(
                "  retrying '{}' in {:.1}s (attempt {} failed: {})",
                step.name,
                delay.as_secs_f64(),
                attempt,
                error
            )
            .yellow()
        );
    }
}
