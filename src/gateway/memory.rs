//! In-memory storage gateway
//!
//! A deterministic, in-process tree that implements [`StorageGateway`]. Used for
//! dry runs (seeded from a real snapshot) and in tests, where scripted faults
//! stand in for provider failures.

use crate::error::GatewayError;
use crate::gateway::StorageGateway;
use crate::tree::{Node, NodeKind, SourceTree};
use crate::types::NodeId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Gateway operation, for fault targeting and call recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    GetMetadata,
    ListChildren,
    CreateFolder,
    CopyFile,
}

/// One recorded gateway call.
///
/// `subject` is the node id for reads and the requested name for mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub op: GatewayOp,
    pub subject: String,
    pub parent_id: Option<NodeId>,
}

struct FaultRule {
    op: GatewayOp,
    /// Matches the subject, or the source id for copies
    target: String,
    error: GatewayError,
    /// None: fail forever
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
    listing_overrides: HashMap<NodeId, Vec<Node>>,
    faults: Vec<FaultRule>,
    calls: Vec<GatewayCall>,
    next_id: u64,
}

impl State {
    fn insert(&mut self, node: Node) {
        if let Some(parent) = &node.parent_id {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone());
        }
        if node.is_folder() {
            self.children.entry(node.id.clone()).or_default();
        }
        self.nodes.insert(node.id.clone(), node);
    }

    fn allocate_id(&mut self) -> NodeId {
        self.next_id += 1;
        format!("mem-{}", self.next_id)
    }

    fn check_fault(&mut self, op: GatewayOp, keys: &[&str]) -> Result<(), GatewayError> {
        let hit = self
            .faults
            .iter_mut()
            .find(|f| f.op == op && keys.contains(&f.target.as_str()) && f.remaining != Some(0));
        if let Some(rule) = hit {
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return Err(rule.error.clone());
        }
        Ok(())
    }

    fn require_folder(&self, id: &str) -> Result<(), GatewayError> {
        match self.nodes.get(id) {
            Some(node) if node.is_folder() => Ok(()),
            Some(_) => Err(GatewayError::NotFound(format!("{} is not a folder", id))),
            None => Err(GatewayError::NotFound(format!("folder {}", id))),
        }
    }
}

/// Thread-safe in-memory provider tree
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a gateway with a copy of `tree` plus an empty destination folder.
    ///
    /// Replicating into `destination_id` then exercises the real plan against
    /// a faithful stand-in of the provider without touching it.
    pub fn seeded_from(tree: &SourceTree, destination_id: &str) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state.lock();
            for (node, _) in tree.walk_depth_first() {
                state.insert(node.clone());
            }
            if !state.nodes.contains_key(destination_id) {
                state.insert(Node::folder(destination_id, "destination", None));
            }
        }
        gateway
    }

    /// Insert a folder; `None` makes it a root
    pub fn add_folder(&self, id: &str, name: &str, parent_id: Option<&str>) {
        self.state.lock().insert(Node::folder(id, name, parent_id));
    }

    /// Insert a PDF file under `parent_id`
    pub fn add_file(&self, id: &str, name: &str, parent_id: &str) {
        self.state
            .lock()
            .insert(Node::file(id, name, Some(parent_id)).with_mime_type("application/pdf"));
    }

    /// Insert an arbitrary node as is
    pub fn add_node(&self, node: Node) {
        self.state.lock().insert(node);
    }

    /// Fail the next `times` matching calls with `error`.
    pub fn fail_times(&self, op: GatewayOp, target: &str, error: GatewayError, times: usize) {
        self.state.lock().faults.push(FaultRule {
            op,
            target: target.to_string(),
            error,
            remaining: Some(times),
        });
    }

    /// Fail every matching call with `error`.
    pub fn fail_always(&self, op: GatewayOp, target: &str, error: GatewayError) {
        self.state.lock().faults.push(FaultRule {
            op,
            target: target.to_string(),
            error,
            remaining: None,
        });
    }

    /// Replace the listing returned for `folder_id`, bypassing tree bookkeeping.
    pub fn inject_listing(&self, folder_id: &str, listing: Vec<Node>) {
        self.state
            .lock()
            .listing_overrides
            .insert(folder_id.to_string(), listing);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls of `op` whose subject is `subject`
    pub fn call_count(&self, op: GatewayOp, subject: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.subject == subject)
            .count()
    }

    /// Current state of a node
    pub fn node(&self, id: &str) -> Option<Node> {
        self.state.lock().nodes.get(id).cloned()
    }

    /// Direct children of `id` in insertion order
    pub fn children_of(&self, id: &str) -> Vec<Node> {
        let state = self.state.lock();
        state
            .children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| state.nodes.get(c).cloned()).collect())
            .unwrap_or_default()
    }

    /// Depth-first outline below (and including) `id`: (depth, name, kind).
    pub fn outline(&self, id: &str) -> Vec<(usize, String, NodeKind)> {
        let state = self.state.lock();
        let mut out = Vec::new();
        let mut stack = vec![(id.to_string(), 0usize)];
        while let Some((current, depth)) = stack.pop() {
            let Some(node) = state.nodes.get(&current) else {
                continue;
            };
            out.push((depth, node.name.clone(), node.kind));
            if let Some(child_ids) = state.children.get(&current) {
                for child in child_ids.iter().rev() {
                    stack.push((child.clone(), depth + 1));
                }
            }
        }
        out
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    async fn get_metadata(&self, id: &str) -> Result<Node, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall {
            op: GatewayOp::GetMetadata,
            subject: id.to_string(),
            parent_id: None,
        });
        state.check_fault(GatewayOp::GetMetadata, &[id])?;
        state
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("node {}", id)))
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<Node>, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall {
            op: GatewayOp::ListChildren,
            subject: folder_id.to_string(),
            parent_id: None,
        });
        state.check_fault(GatewayOp::ListChildren, &[folder_id])?;
        if let Some(listing) = state.listing_overrides.get(folder_id) {
            return Ok(listing.clone());
        }
        state.require_folder(folder_id)?;
        Ok(state
            .children
            .get(folder_id)
            .map(|ids| ids.iter().filter_map(|c| state.nodes.get(c).cloned()).collect())
            .unwrap_or_default())
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<NodeId, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall {
            op: GatewayOp::CreateFolder,
            subject: name.to_string(),
            parent_id: Some(parent_id.to_string()),
        });
        state.check_fault(GatewayOp::CreateFolder, &[name])?;
        state.require_folder(parent_id)?;
        let id = state.allocate_id();
        state.insert(Node::folder(id.clone(), name, Some(parent_id)));
        Ok(id)
    }

    async fn copy_file(
        &self,
        source_id: &str,
        new_name: &str,
        parent_id: &str,
    ) -> Result<NodeId, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall {
            op: GatewayOp::CopyFile,
            subject: new_name.to_string(),
            parent_id: Some(parent_id.to_string()),
        });
        state.check_fault(GatewayOp::CopyFile, &[new_name, source_id])?;
        let source = match state.nodes.get(source_id) {
            Some(node) if !node.is_folder() => node.clone(),
            Some(_) => {
                return Err(GatewayError::PermissionDenied(format!(
                    "{} is a folder and cannot be copied",
                    source_id
                )))
            }
            None => return Err(GatewayError::NotFound(format!("file {}", source_id))),
        };
        state.require_folder(parent_id)?;
        let id = state.allocate_id();
        let mut copy = Node::file(id.clone(), new_name, Some(parent_id));
        copy.mime_type = source.mime_type;
        state.insert(copy);
        Ok(id)
    }
}
