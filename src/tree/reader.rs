//! Tree Reader
//!
//! Pulls a complete source subtree into a [`SourceTree`] before anything is
//! created at the destination. An incomplete snapshot cannot be planned safely,
//! so any gateway failure aborts the read.

use crate::error::ApiError;
use crate::gateway::StorageGateway;
use crate::tree::{SourceTree, SourceTreeBuilder};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// Default guard against pathologically deep responses.
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub struct TreeReader {
    gateway: Arc<dyn StorageGateway>,
    max_depth: usize,
}

impl TreeReader {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Cap folder nesting below the root
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Read the subtree rooted at `root_id`, breadth-first.
    pub async fn read(&self, root_id: &str) -> Result<SourceTree, ApiError> {
        let root = self
            .gateway
            .get_metadata(root_id)
            .await
            .map_err(|source| ApiError::SourceRead {
                folder_id: root_id.to_string(),
                source,
            })?;
        // Listings key off the id the provider reports, which may differ from an alias
        let canonical_id = root.id.clone();
        let mut builder = SourceTreeBuilder::new(root)?;

        let mut pending: VecDeque<(String, usize)> = VecDeque::new();
        pending.push_back((canonical_id, 0));
        let mut listed_folders = 0usize;

        while let Some((folder_id, depth)) = pending.pop_front() {
            let children = self
                .gateway
                .list_children(&folder_id)
                .await
                .map_err(|source| ApiError::SourceRead {
                    folder_id: folder_id.clone(),
                    source,
                })?;
            listed_folders += 1;
            debug!(
                folder_id = %folder_id,
                depth,
                children = children.len(),
                "Listed source folder"
            );

            let subfolders: Vec<String> = children
                .iter()
                .filter(|c| c.is_folder())
                .map(|c| c.id.clone())
                .collect();
            if !subfolders.is_empty() && depth + 1 > self.max_depth {
                return Err(ApiError::MalformedTree(format!(
                    "folder {} exceeds maximum depth {}",
                    folder_id, self.max_depth
                )));
            }

            builder.add_children(&folder_id, children)?;
            for id in subfolders {
                pending.push_back((id, depth + 1));
            }
        }

        let tree = builder.build();
        info!(
            root_id = %root_id,
            folders = tree.folder_count(),
            files = tree.file_count(),
            listed_folders,
            "Source tree snapshot complete"
        );
        Ok(tree)
    }
}
