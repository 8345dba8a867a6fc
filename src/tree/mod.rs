//! Source tree snapshot
//!
//! An immutable, in-memory copy of every node reachable from a template root,
//! captured before any destination mutation begins.

pub mod node;
pub mod reader;

pub use node::{Node, NodeKind};
pub use reader::TreeReader;

use crate::error::ApiError;
use crate::types::NodeId;
use std::collections::HashMap;

/// Immutable snapshot of a source subtree rooted at one folder
#[derive(Debug, Clone)]
pub struct SourceTree {
    root_id: NodeId,
    nodes: HashMap<NodeId, Node>,
    /// folder id -> child ids, in the order the provider listed them
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl SourceTree {
    pub fn root(&self) -> &Node {
        // The builder only ever produces trees containing their root.
        &self.nodes[&self.root_id]
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Children of a folder in listing order; empty for files and unknown ids.
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // There is always a root.
        false
    }

    /// Number of folders, root included
    pub fn folder_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_folder()).count()
    }

    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| !n.is_folder()).count()
    }

    /// Depth-first pre-order walk: (node, depth) with the root at depth 0.
    ///
    /// Siblings are visited in listing order, so every folder is yielded before
    /// any of its descendants.
    pub fn walk_depth_first(&self) -> Vec<(&Node, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(&str, usize)> = vec![(self.root_id.as_str(), 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push((node, depth));
            if let Some(child_ids) = self.children.get(id) {
                for child in child_ids.iter().rev() {
                    stack.push((child.as_str(), depth + 1));
                }
            }
        }
        out
    }

    /// Depth of the deepest node (root = 0)
    pub fn max_depth(&self) -> usize {
        self.walk_depth_first()
            .iter()
            .map(|(_, depth)| *depth)
            .max()
            .unwrap_or(0)
    }
}

/// Incremental constructor for [`SourceTree`] that enforces the single-parent invariant.
#[derive(Debug)]
pub struct SourceTreeBuilder {
    root_id: NodeId,
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl SourceTreeBuilder {
    /// Start a tree at `root`, which must be a folder.
    pub fn new(mut root: Node) -> Result<Self, ApiError> {
        if !root.is_folder() {
            return Err(ApiError::MalformedTree(format!(
                "root {} ('{}') is not a folder",
                root.id, root.name
            )));
        }
        root.parent_id = None;
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        let mut children = HashMap::new();
        children.insert(root_id.clone(), Vec::new());
        Ok(Self {
            root_id,
            nodes,
            children,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Attach one listing of `parent_id`'s children.
    ///
    /// Rejects children reported under a different parent, ids already in the
    /// tree (a cycle or a multi-parent node), and listings of non-folders.
    pub fn add_children(&mut self, parent_id: &str, listed: Vec<Node>) -> Result<(), ApiError> {
        match self.nodes.get(parent_id) {
            Some(parent) if parent.is_folder() => {}
            Some(parent) => {
                return Err(ApiError::MalformedTree(format!(
                    "children listed under file {} ('{}')",
                    parent.id, parent.name
                )))
            }
            None => {
                return Err(ApiError::MalformedTree(format!(
                    "children listed under unknown folder {}",
                    parent_id
                )))
            }
        }

        for mut child in listed {
            match child.parent_id.as_deref() {
                Some(reported) if reported != parent_id => {
                    return Err(ApiError::MalformedTree(format!(
                        "node {} listed under {} but reports parent {}",
                        child.id, parent_id, reported
                    )));
                }
                Some(_) => {}
                None => child.parent_id = Some(parent_id.to_string()),
            }
            if self.nodes.contains_key(&child.id) {
                return Err(ApiError::MalformedTree(format!(
                    "node {} ('{}') reached more than once (cycle or multiple parents)",
                    child.id, child.name
                )));
            }
            let child_id = child.id.clone();
            if child.is_folder() {
                self.children.insert(child_id.clone(), Vec::new());
            }
            self.nodes.insert(child_id.clone(), child);
            self.children
                .entry(parent_id.to_string())
                .or_default()
                .push(child_id);
        }
        Ok(())
    }

    pub fn build(self) -> SourceTree {
        SourceTree {
            root_id: self.root_id,
            nodes: self.nodes,
            children: self.children,
        }
    }
}
