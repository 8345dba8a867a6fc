//! Run outcome types: executor state, per-step outcomes, the final result.

use crate::error::GatewayError;
use crate::tree::NodeKind;
use crate::types::NodeId;
use serde::{Serialize, Serializer};
use std::fmt;

/// Lifecycle of a replication run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Idle,
    Running,
    Completed,
    CompletedWithFailures,
    Cancelled,
    /// Root creation failed (or the plan was rejected); surfaced as an error
    Failed,
}

impl ExecutorState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutorState::Idle | ExecutorState::Running)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Running => "running",
            ExecutorState::Completed => "completed",
            ExecutorState::CompletedWithFailures => "completed with failures",
            ExecutorState::Cancelled => "cancelled",
            ExecutorState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why a node was not replicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The gateway call failed, after any retries
    Gateway(GatewayError),
    /// The node's destination parent was never created
    ParentUnavailable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Gateway(err) => write!(f, "{}", err),
            FailureReason::ParentUnavailable => f.write_str("parent not created"),
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A node that could not be replicated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub source_id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub reason: FailureReason,
    /// Gateway calls made for this node; zero when its parent was missing
    pub attempts: u32,
}

/// Outcome of one plan step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Created { destination_id: NodeId, attempts: u32 },
    Failed { reason: FailureReason, attempts: u32 },
}

impl StepOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, StepOutcome::Created { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            StepOutcome::Created { attempts, .. } | StepOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Summary of a replication run
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationResult {
    pub root_destination_id: NodeId,
    pub root_name: String,
    /// Folders created, the root included
    pub created_folders: usize,
    pub copied_files: usize,
    pub failures: Vec<NodeFailure>,
    pub cancelled: bool,
    pub state: ExecutorState,
    pub total_steps: usize,
    pub duration_ms: u64,
}

impl ReplicationResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Steps never reached because the run was cancelled.
    pub fn unattempted_steps(&self) -> usize {
        self.total_steps
            .saturating_sub(self.created_folders + self.copied_files + self.failures.len())
    }

    pub fn failure_for(&self, source_id: &str) -> Option<&NodeFailure> {
        self.failures.iter().find(|f| f.source_id == source_id)
    }
}
