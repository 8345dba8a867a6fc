//! Remote tree entries

use crate::types::{NodeId, FOLDER_MIME_TYPE};
use serde::{Deserialize, Serialize};

/// Kind of a remote tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

impl NodeKind {
    /// Classify a provider MIME type. Anything that is not a folder is a copyable file.
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            NodeKind::Folder
        } else {
            NodeKind::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
        }
    }
}

/// One folder or file at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Display name; not unique among siblings
    pub name: String,
    pub kind: NodeKind,
    /// None only at the root of a snapshot
    pub parent_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Node {
    pub fn folder(id: impl Into<NodeId>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Folder,
            parent_id: parent_id.map(str::to_string),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        }
    }

    pub fn file(id: impl Into<NodeId>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::File,
            parent_id: parent_id.map(str::to_string),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Native Google Workspace documents (Docs, Sheets, Slides...) rather than uploaded blobs.
    pub fn is_workspace_document(&self) -> bool {
        self.kind == NodeKind::File
            && self
                .mime_type
                .as_deref()
                .map(|m| m.starts_with("application/vnd.google-apps."))
                .unwrap_or(false)
    }
}
