//! Format trees, plans, run reports and checks as text or JSON.

use crate::credentials::StoredCredential;
use crate::error::ApiError;
use crate::gateway::drive::DriveUser;
use crate::orchestrator::{AccessReport, WorkspaceReport};
use crate::plan::ReplicationPlan;
use crate::replication::ExecutorState;
use crate::tree::{NodeKind, SourceTree};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to serialize output: {}", e)))
}

/// One row of a flattened tree
#[derive(Debug, Serialize)]
pub struct ListingEntry {
    pub depth: usize,
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Serializable view of a snapshot
#[derive(Debug, Serialize)]
pub struct TreeListing {
    pub root_id: String,
    pub folders: usize,
    pub files: usize,
    pub max_depth: usize,
    pub nodes: Vec<ListingEntry>,
}

impl TreeListing {
    pub fn from_tree(tree: &SourceTree) -> Self {
        Self {
            root_id: tree.root_id().to_string(),
            folders: tree.folder_count(),
            files: tree.file_count(),
            max_depth: tree.max_depth(),
            nodes: tree
                .walk_depth_first()
                .into_iter()
                .map(|(node, depth)| ListingEntry {
                    depth,
                    id: node.id.clone(),
                    name: node.name.clone(),
                    kind: node.kind,
                    mime_type: node.mime_type.clone(),
                })
                .collect(),
        }
    }
}

/// Indented outline of a template, with totals.
pub fn format_tree_text(tree: &SourceTree) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Template Contents")));
    for (node, depth) in tree.walk_depth_first() {
        let indent = "  ".repeat(depth + 1);
        match node.kind {
            NodeKind::Folder => {
                out.push_str(&format!("{}{}/\n", indent, node.name.blue()));
            }
            NodeKind::File => {
                let mime = node.mime_type.as_deref().unwrap_or("unknown");
                if node.is_workspace_document() {
                    out.push_str(&format!("{}{} ({})\n", indent, node.name.yellow(), mime));
                } else {
                    out.push_str(&format!("{}{} ({})\n", indent, node.name.green(), mime));
                }
            }
        }
    }
    out.push('\n');

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Folders", "Files", "Depth"]);
    table.add_row(vec![
        tree.folder_count().to_string(),
        tree.file_count().to_string(),
        tree.max_depth().to_string(),
    ]);
    out.push_str(&format!("{}\n", table));
    out.push_str("Folder count includes the template root.\n");
    out
}

pub fn format_plan_text(plan: &ReplicationPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Replication Plan")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Action", "Name", "Source"]);
    for (index, step) in plan.steps().iter().enumerate() {
        let action = match step.kind {
            NodeKind::Folder => "create folder",
            NodeKind::File => "copy file",
        };
        table.add_row(vec![
            index.to_string(),
            action.to_string(),
            step.name.clone(),
            step.source_id.clone(),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Total: {} steps ({} folders, {} files).\n",
        plan.len(),
        plan.folder_steps(),
        plan.file_steps()
    ));
    out
}

pub fn format_report_text(report: &WorkspaceReport) -> String {
    let result = &report.result;
    let mut out = String::new();
    let title = if report.dry_run {
        "Dry Run Result"
    } else {
        "Workspace Result"
    };
    out.push_str(&format!("{}\n\n", format_section_heading(title)));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Client", "Folder ID", "Folders", "Files", "Failed", "Time"]);
    table.add_row(vec![
        report.client_name.clone(),
        result.root_destination_id.clone(),
        result.created_folders.to_string(),
        result.copied_files.to_string(),
        result.failures.len().to_string(),
        format!("{:.1}s", result.duration_ms as f64 / 1000.0),
    ]);
    out.push_str(&format!("{}\n\n", table));

    if !result.failures.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Failures")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Name", "Kind", "Attempts", "Reason"]);
        for failure in &result.failures {
            table.add_row(vec![
                failure.name.clone(),
                failure.kind.as_str().to_string(),
                failure.attempts.to_string(),
                failure.reason.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    let summary = match result.state {
        ExecutorState::Completed if report.dry_run => {
            format!("{}", "Dry run complete; nothing was created.".green())
        }
        ExecutorState::Completed => format!(
            "{} You can now open the '{}' folder in Google Drive.",
            "Workspace created.".green(),
            report.client_name
        ),
        ExecutorState::CompletedWithFailures => format!(
            "{} {} item(s) were not replicated; the rest of the workspace is in place.",
            "Workspace created with failures.".yellow(),
            result.failures.len()
        ),
        ExecutorState::Cancelled => format!(
            "{} {} step(s) were not attempted; created items were kept.",
            "Cancelled.".yellow(),
            result.unattempted_steps()
        ),
        other => format!("Run ended in state: {}", other),
    };
    out.push_str(&summary);
    out.push('\n');
    out
}

/// Result of `check`
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub credentials: String,
    pub account: DriveUser,
    pub access: AccessReport,
}

pub fn format_check_text(check: &CheckReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Prerequisites")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Check", "Status", "Detail"]);
    let ok = format!("{}", "ok".green());
    table.add_row(vec!["Credentials".to_string(), ok.clone(), check.credentials.clone()]);
    table.add_row(vec![
        "Drive account".to_string(),
        ok.clone(),
        format!(
            "{} <{}>",
            check.account.display_name, check.account.email_address
        ),
    ]);
    table.add_row(vec![
        "Template folder".to_string(),
        ok.clone(),
        format!("{} ({})", check.access.template.name, check.access.template.id),
    ]);
    table.add_row(vec![
        "Target folder".to_string(),
        ok,
        format!(
            "{} ({})",
            check.access.target_parent.name, check.access.target_parent.id
        ),
    ]);
    out.push_str(&format!("{}\n\n", table));
    out.push_str("All prerequisites met.\n");
    out
}

pub fn format_credentials_text(entries: &[StoredCredential], active: &str, env_override: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Credentials")));
    if env_override {
        out.push_str(&format!(
            "{} is set and overrides stored profiles.\n\n",
            crate::credentials::ACCESS_TOKEN_ENV
        ));
    }
    if entries.is_empty() {
        out.push_str("No credential profiles stored.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Profile", "Active", "Source", "Created"]);
    for entry in entries {
        let created = entry
            .credential
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            entry.profile.clone(),
            if entry.profile == active { "yes" } else { "" }.to_string(),
            entry.credential.source.describe(),
            created,
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
