//! Storage Gateway
//!
//! The capability surface the replication engine consumes from a storage
//! provider. Every call is a suspension point and may fail with a
//! [`GatewayError`]; rate limiting and transient network failures are
//! recoverable, everything else is not.

pub mod drive;
pub mod memory;

pub use drive::{DriveConfig, DriveGateway};
pub use memory::{GatewayCall, GatewayOp, InMemoryGateway};

use crate::error::GatewayError;
use crate::tree::Node;
use crate::types::NodeId;
use async_trait::async_trait;

/// Remote tree operations used by the reader and the executor.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Metadata of a single node.
    async fn get_metadata(&self, id: &str) -> Result<Node, GatewayError>;

    /// Every direct child of a folder, in provider order.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<Node>, GatewayError>;

    /// Create a folder named `name` under `parent_id`; returns the new id.
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<NodeId, GatewayError>;

    /// Copy `source_id` into `parent_id` as `new_name`; returns the copy's id.
    async fn copy_file(
        &self,
        source_id: &str,
        new_name: &str,
        parent_id: &str,
    ) -> Result<NodeId, GatewayError>;
}
