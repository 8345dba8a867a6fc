//! Workspace Orchestrator
//!
//! Ties the engine together for one client workspace: access checks against
//! the configured folders, reading the template, planning under the client
//! name, and executing (for real or against an in-memory copy).

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::gateway::{InMemoryGateway, StorageGateway};
use crate::plan::{ReplicationPlan, TreePlanner};
use crate::replication::{
    CancellationFlag, ExecutorOptions, NoopObserver, ReplicationExecutor, ReplicationObserver,
    ReplicationResult,
};
use crate::tree::reader::TreeReader;
use crate::tree::{Node, SourceTree};
use crate::types::MAX_CLIENT_NAME_LEN;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Trim and check a client name; returns the trimmed name.
pub fn validate_client_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::ConfigError(
            "Client name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_CLIENT_NAME_LEN {
        return Err(ApiError::ConfigError(format!(
            "Client name too long (max {} characters)",
            MAX_CLIENT_NAME_LEN
        )));
    }
    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(ApiError::ConfigError(
            "Client name cannot contain '/' or control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// The two configured folders, as the provider sees them
#[derive(Debug, Clone, Serialize)]
pub struct AccessReport {
    pub template: Node,
    pub target_parent: Node,
}

/// Outcome of one workspace creation
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceReport {
    pub client_name: String,
    pub template_folder_id: String,
    pub target_parent_folder_id: String,
    pub dry_run: bool,
    pub result: ReplicationResult,
}

pub struct WorkspaceOrchestrator {
    gateway: Arc<dyn StorageGateway>,
    config: AppConfig,
    observer: Arc<dyn ReplicationObserver>,
    cancellation: CancellationFlag,
}

impl WorkspaceOrchestrator {
    /// Orchestrator over `gateway` using `config` for folder ids and options
    pub fn new(gateway: Arc<dyn StorageGateway>, config: AppConfig) -> Self {
        Self {
            gateway,
            config,
            observer: Arc::new(NoopObserver),
            cancellation: CancellationFlag::new(),
        }
    }

    /// Forward replication progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn ReplicationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share a cancellation flag with the executor
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Configuration this orchestrator runs with
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Confirm the template and target parent exist, are readable, and are folders.
    pub async fn check_access(&self) -> Result<AccessReport, ApiError> {
        let template = self
            .expect_folder(&self.config.template_folder_id, "template_folder_id")
            .await?;
        let target_parent = self
            .expect_folder(&self.config.target_parent_folder_id, "target_parent_folder_id")
            .await?;
        info!(
            template = %template.name,
            target_parent = %target_parent.name,
            "Folder access verified"
        );
        Ok(AccessReport {
            template,
            target_parent,
        })
    }

    async fn expect_folder(&self, id: &str, setting: &str) -> Result<Node, ApiError> {
        let node = self.gateway.get_metadata(id).await?;
        if !node.is_folder() {
            return Err(ApiError::ConfigError(format!(
                "{} '{}' ({}) is not a folder",
                setting, node.name, id
            )));
        }
        Ok(node)
    }

    /// Snapshot the configured template folder.
    pub async fn read_template(&self) -> Result<SourceTree, ApiError> {
        self.read_folder(&self.config.template_folder_id).await
    }

    /// Snapshot an arbitrary folder.
    pub async fn read_folder(&self, folder_id: &str) -> Result<SourceTree, ApiError> {
        TreeReader::new(Arc::clone(&self.gateway))
            .with_max_depth(self.config.replication.max_depth)
            .read(folder_id)
            .await
    }

    /// Plan `tree` under a validated client name.
    pub fn plan(&self, tree: &SourceTree, client_name: &str) -> Result<ReplicationPlan, ApiError> {
        let name = validate_client_name(client_name)?;
        let plan = TreePlanner::plan(tree, &name);
        plan.validate()?;
        Ok(plan)
    }

    /// Read, plan and replicate the template into a new `client_name` folder.
    pub async fn create_workspace(&self, client_name: &str) -> Result<WorkspaceReport, ApiError> {
        let name = validate_client_name(client_name)?;
        let tree = self.read_template().await?;
        self.replicate(&tree, &name).await
    }

    /// Replicate an already-read tree under the target parent.
    pub async fn replicate(
        &self,
        tree: &SourceTree,
        client_name: &str,
    ) -> Result<WorkspaceReport, ApiError> {
        let plan = self.plan(tree, client_name)?;
        let options = ExecutorOptions::from(&self.config.replication);
        let result = self
            .execute_with(Arc::clone(&self.gateway), options, &plan)
            .await?;
        Ok(self.report(plan, result, false))
    }

    /// Replicate `tree` into an in-memory copy of the provider; nothing remote is mutated.
    pub async fn dry_run(
        &self,
        tree: &SourceTree,
        client_name: &str,
    ) -> Result<(WorkspaceReport, Arc<InMemoryGateway>), ApiError> {
        let plan = self.plan(tree, client_name)?;
        let sandbox = Arc::new(InMemoryGateway::seeded_from(
            tree,
            &self.config.target_parent_folder_id,
        ));
        let options = ExecutorOptions {
            pacing: Duration::ZERO,
            ..ExecutorOptions::from(&self.config.replication)
        };
        let result = self.execute_with(sandbox.clone(), options, &plan).await?;
        Ok((self.report(plan, result, true), sandbox))
    }

    async fn execute_with(
        &self,
        gateway: Arc<dyn StorageGateway>,
        options: ExecutorOptions,
        plan: &ReplicationPlan,
    ) -> Result<ReplicationResult, ApiError> {
        let mut executor = ReplicationExecutor::new(gateway, options)
            .with_observer(Arc::clone(&self.observer))
            .with_cancellation(self.cancellation.clone());
        executor
            .execute(plan, &self.config.target_parent_folder_id)
            .await
    }

    fn report(&self, plan: ReplicationPlan, result: ReplicationResult, dry_run: bool) -> WorkspaceReport {
        WorkspaceReport {
            client_name: plan.root().map(|s| s.name.clone()).unwrap_or_default(),
            template_folder_id: self.config.template_folder_id.clone(),
            target_parent_folder_id: self.config.target_parent_folder_id.clone(),
            dry_run,
            result,
        }
    }
}
