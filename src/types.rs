//! Core types for the template replication engine.

/// NodeId: opaque, provider-assigned identifier of a folder or file.
///
/// Stable for the lifetime of the node at the provider.
pub type NodeId = String;

/// MIME type the Drive API uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Maximum length of a client (root folder) name.
pub const MAX_CLIENT_NAME_LEN: usize = 50;
