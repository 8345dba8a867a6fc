//! folderseed: Template Workspace Replication
//!
//! Snapshots a template folder tree in cloud storage, plans its replication
//! under a new client-named root, and executes the plan against the storage
//! provider with retries, pacing and a per-item outcome report.

pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod replication;
pub mod tooling;
pub mod tree;
pub mod types;
