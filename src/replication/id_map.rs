//! Source id to destination id mapping built during a run.

use crate::types::NodeId;
use std::collections::HashMap;

/// Append-only source → destination id map.
///
/// Never holds two destination ids for one source id: re-inserting an existing
/// key keeps the first value.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: HashMap<NodeId, NodeId>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Returns false (and changes nothing) if `source_id` is already mapped.
    pub fn insert(&mut self, source_id: NodeId, destination_id: NodeId) -> bool {
        match self.entries.entry(source_id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(destination_id);
                true
            }
        }
    }

    pub fn get(&self, source_id: &str) -> Option<&NodeId> {
        self.entries.get(source_id)
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.contains_key(source_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.entries.iter()
    }
}
