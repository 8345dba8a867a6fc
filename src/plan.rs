//! Tree Planner
//!
//! Turns an immutable [`SourceTree`] and a client-chosen root name into an
//! ordered list of create-folder / copy-file steps. Parents always precede the
//! steps that reference them.

use crate::error::ApiError;
use crate::tree::{NodeKind, SourceTree};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One create-or-copy instruction derived from a source node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub source_id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// None only for the synthetic root step
    pub source_parent_id: Option<NodeId>,
}

impl PlanStep {
    pub fn is_root(&self) -> bool {
        self.source_parent_id.is_none()
    }
}

/// Ordered replication plan; the first step is the synthetic root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPlan {
    steps: Vec<PlanStep>,
}

impl ReplicationPlan {
    /// Wrap pre-built steps. Use [`ReplicationPlan::validate`] before executing them.
    pub fn from_steps(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn root(&self) -> Option<&PlanStep> {
        self.steps.first()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn folder_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.kind == NodeKind::Folder)
            .count()
    }

    pub fn file_steps(&self) -> usize {
        self.steps.len() - self.folder_steps()
    }

    /// Check the topological invariant: exactly one root step, first, and every
    /// other step's parent is a Folder step that appears earlier.
    pub fn validate(&self) -> Result<(), ApiError> {
        let root = self
            .steps
            .first()
            .ok_or_else(|| ApiError::InvalidPlan("plan has no steps".to_string()))?;
        if !root.is_root() || root.kind != NodeKind::Folder {
            return Err(ApiError::InvalidPlan(
                "first step must be the root folder".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(self.steps.len());
        let mut folders: HashSet<&str> = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if !seen.insert(step.source_id.as_str()) {
                return Err(ApiError::InvalidPlan(format!(
                    "step {} repeats source {}",
                    index, step.source_id
                )));
            }
            match (index, step.source_parent_id.as_deref()) {
                (0, _) => {}
                (_, None) => {
                    return Err(ApiError::InvalidPlan(format!(
                        "step {} ('{}') has no parent",
                        index, step.name
                    )))
                }
                (_, Some(parent)) if !folders.contains(parent) => {
                    return Err(ApiError::InvalidPlan(format!(
                        "step {} ('{}') references parent {} before it is created",
                        index, step.name, parent
                    )))
                }
                _ => {}
            }
            if step.kind == NodeKind::Folder {
                folders.insert(step.source_id.as_str());
            }
        }
        Ok(())
    }
}

/// Builds replication plans
pub struct TreePlanner;

impl TreePlanner {
    /// Emit one step per source node, depth-first pre-order.
    ///
    /// The root keeps its source id but takes `root_name`; every descendant keeps
    /// its name verbatim, duplicates included.
    pub fn plan(tree: &SourceTree, root_name: &str) -> ReplicationPlan {
        let steps = tree
            .walk_depth_first()
            .into_iter()
            .map(|(node, depth)| {
                if depth == 0 {
                    PlanStep {
                        source_id: node.id.clone(),
                        kind: NodeKind::Folder,
                        name: root_name.to_string(),
                        source_parent_id: None,
                    }
                } else {
                    PlanStep {
                        source_id: node.id.clone(),
                        kind: node.kind,
                        name: node.name.clone(),
                        source_parent_id: node.parent_id.clone(),
                    }
                }
            })
            .collect();
        ReplicationPlan { steps }
    }
}
