//! CLI Tooling
//!
//! Command-line interface for creating client workspaces from the template
//! folder, inspecting and planning without side effects, checking
//! prerequisites, and managing stored credentials.

use crate::config::{AppConfig, ConfigLoader};
use crate::credentials::{
    resolve_access_token, CredentialProfile, CredentialSource, CredentialStore,
    ServiceAccountKey, XdgCredentialStore, ACCESS_TOKEN_ENV,
};
use crate::error::ApiError;
use crate::gateway::DriveGateway;
use crate::orchestrator::{validate_client_name, WorkspaceOrchestrator, WorkspaceReport};
use crate::replication::{CancellationFlag, ExecutorState, NoopObserver, ReplicationObserver};
use crate::tooling::format::{
    format_check_text, format_credentials_text, format_plan_text, format_report_text,
    format_tree_text, to_json, CheckReport, TreeListing,
};
use crate::tooling::progress::ConsoleProgress;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Exit status for a run that finished with failed items or was cancelled
pub const EXIT_PARTIAL: i32 = 2;

/// folderseed CLI - Replicate a template folder tree into a new client workspace
#[derive(Parser)]
#[command(name = "folderseed")]
#[command(version)]
#[command(about = "Replicate a Google Drive template folder into a new client workspace")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory (where folderseed.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new client workspace from the template
    Create {
        /// Client name; prompted for when omitted
        client_name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Replicate into an in-memory copy instead of Drive
        #[arg(long)]
        dry_run: bool,
        /// Concurrent Drive calls (overrides replication.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the template tree and its folder/file counts
    Inspect {
        /// Folder to inspect instead of the configured template
        #[arg(long)]
        folder: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the replication plan for a client name without executing it
    Plan {
        client_name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Verify credentials, Drive connectivity and folder access
    Check {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Manage stored credentials
    Credentials {
        #[command(subcommand)]
        command: CredentialCommands,
    },
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Store a credential profile (interactive when no source flag is given)
    Set {
        /// Profile name (default: credentials.profile from config)
        #[arg(long)]
        profile: Option<String>,
        /// Service account key file (JSON) downloaded from the Cloud console
        #[arg(long, value_name = "PATH", conflicts_with_all = ["token", "env", "command"])]
        service_account: Option<PathBuf>,
        /// Literal OAuth access token
        #[arg(long, conflicts_with_all = ["env", "command"])]
        token: Option<String>,
        /// Environment variable holding the token
        #[arg(long, conflicts_with = "command")]
        env: Option<String>,
        /// Command printing a token, e.g. --command gcloud auth print-access-token
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List stored profiles (secrets are redacted)
    Show {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete a stored profile
    Delete {
        #[arg(long)]
        profile: Option<String>,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// What a command prints and how the process should exit
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// CLI context for command execution
pub struct CliContext {
    config: AppConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_parts(config, Arc::new(XdgCredentialStore::new())))
    }

    /// Create a context over an already loaded config and credential store
    pub fn with_parts(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Effective configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Create {
                client_name,
                yes,
                dry_run,
                concurrency,
                format,
            } => self.handle_create(client_name.as_deref(), *yes, *dry_run, *concurrency, format),
            Commands::Inspect { folder, format } => self
                .handle_inspect(folder.as_deref(), format)
                .map(CommandOutput::ok),
            Commands::Plan {
                client_name,
                format,
            } => self.handle_plan(client_name, format).map(CommandOutput::ok),
            Commands::Check { format } => self.handle_check(format).map(CommandOutput::ok),
            Commands::Credentials { command } => {
                self.handle_credentials(command).map(CommandOutput::ok)
            }
        }
    }

    fn runtime() -> Result<tokio::runtime::Runtime, ApiError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))
    }

    fn check_format(format: &str) -> Result<(), ApiError> {
        match format {
            "text" | "json" => Ok(()),
            other => Err(ApiError::ConfigError(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    /// Build an authenticated Drive gateway from the active credential profile.
    async fn drive_gateway(&self) -> Result<Arc<DriveGateway>, ApiError> {
        let token =
            resolve_access_token(self.credentials.as_ref(), &self.config.credentials.profile)
                .await?;
        Ok(Arc::new(DriveGateway::new(&self.config.drive, token)?))
    }

    fn orchestrator(&self, gateway: Arc<DriveGateway>, config: AppConfig) -> WorkspaceOrchestrator {
        WorkspaceOrchestrator::new(gateway, config)
    }

    /// Handle create command
    fn handle_create(
        &self,
        client_name: Option<&str>,
        yes: bool,
        dry_run: bool,
        concurrency: Option<usize>,
        format: &str,
    ) -> Result<CommandOutput, ApiError> {
        Self::check_format(format)?;
        if format == "json" {
            // JSON output never prompts
            if client_name.is_none() {
                return Err(ApiError::ConfigError(
                    "CLIENT_NAME is required with --format json".to_string(),
                ));
            }
            if !yes && !dry_run {
                return Err(ApiError::ConfigError(
                    "--yes (or --dry-run) is required with --format json".to_string(),
                ));
            }
        }
        let mut config = self.config.clone();
        if let Some(n) = concurrency {
            config.replication.concurrency = n;
        }
        config.validate()?;

        let interactive = format == "text";
        let client_name = match client_name {
            Some(name) => validate_client_name(name)?,
            None => Self::prompt_client_name()?,
        };

        let cancellation = CancellationFlag::new();
        let observer: Arc<dyn ReplicationObserver> = if interactive {
            Arc::new(ConsoleProgress::new())
        } else {
            Arc::new(NoopObserver)
        };

        let rt = Self::runtime()?;
        let report: Option<WorkspaceReport> = rt.block_on(async {
            if interactive {
                eprintln!("Checking prerequisites...");
            }
            let gateway = self.drive_gateway().await?;
            let orchestrator = self
                .orchestrator(gateway, config)
                .with_observer(observer)
                .with_cancellation(cancellation.clone());
            let access = orchestrator.check_access().await?;

            if interactive {
                eprintln!("Reading template '{}'...", access.template.name);
            }
            let tree = orchestrator.read_template().await?;
            info!(
                client_name = %client_name,
                folders = tree.folder_count(),
                files = tree.file_count(),
                dry_run,
                "Template loaded"
            );

            if !yes && !dry_run {
                let prompt = format!(
                    "Create workspace '{}' under '{}' ({} folders, {} files)?",
                    client_name,
                    access.target_parent.name,
                    tree.folder_count(),
                    tree.file_count()
                );
                if !Self::confirm(&prompt)? {
                    return Ok(None);
                }
            }

            // Ctrl-C stops the run between steps; already created items are kept.
            let flag = cancellation.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current step");
                    flag.cancel();
                }
            });
            let report = if dry_run {
                orchestrator.dry_run(&tree, &client_name).await.map(|(r, _)| r)
            } else {
                orchestrator.replicate(&tree, &client_name).await
            };
            watcher.abort();
            report.map(Some)
        })?;

        let Some(report) = report else {
            return Ok(CommandOutput::ok("Workspace creation cancelled".to_string()));
        };
        let exit_code = match report.result.state {
            ExecutorState::Completed => 0,
            _ => EXIT_PARTIAL,
        };
        let text = if format == "json" {
            to_json(&report)?
        } else {
            format_report_text(&report)
        };
        Ok(CommandOutput { text, exit_code })
    }

    fn prompt_client_name() -> Result<String, ApiError> {
        use dialoguer::Input;

        let name: String = Input::new()
            .with_prompt("Enter client name")
            .validate_with(|input: &String| -> Result<(), String> {
                validate_client_name(input).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()
            .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;
        validate_client_name(&name)
    }

    fn confirm(prompt: &str) -> Result<bool, ApiError> {
        use dialoguer::Confirm;

        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))
    }

    /// Handle inspect command
    fn handle_inspect(&self, folder: Option<&str>, format: &str) -> Result<String, ApiError> {
        Self::check_format(format)?;
        let folder_id = match folder {
            Some(id) => id.to_string(),
            None if !self.config.template_folder_id.trim().is_empty() => {
                self.config.template_folder_id.clone()
            }
            None => {
                return Err(ApiError::ConfigError(
                    "No folder given and template_folder_id is not set".to_string(),
                ))
            }
        };

        let rt = Self::runtime()?;
        let tree = rt.block_on(async {
            let gateway = self.drive_gateway().await?;
            self.orchestrator(gateway, self.config.clone())
                .read_folder(&folder_id)
                .await
        })?;

        if format == "json" {
            to_json(&TreeListing::from_tree(&tree))
        } else {
            Ok(format_tree_text(&tree))
        }
    }

    /// Handle plan command
    fn handle_plan(&self, client_name: &str, format: &str) -> Result<String, ApiError> {
        Self::check_format(format)?;
        let name = validate_client_name(client_name)?;
        if self.config.template_folder_id.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "template_folder_id is not set".to_string(),
            ));
        }

        let rt = Self::runtime()?;
        let plan = rt.block_on(async {
            let gateway = self.drive_gateway().await?;
            let orchestrator = self.orchestrator(gateway, self.config.clone());
            let tree = orchestrator.read_template().await?;
            orchestrator.plan(&tree, &name)
        })?;

        if format == "json" {
            to_json(&plan)
        } else {
            Ok(format_plan_text(&plan))
        }
    }

    /// Handle check command
    fn handle_check(&self, format: &str) -> Result<String, ApiError> {
        Self::check_format(format)?;
        self.config.validate()?;

        let credentials = if std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|v| !v.trim().is_empty()) {
            format!("${}", ACCESS_TOKEN_ENV)
        } else {
            let profile = &self.config.credentials.profile;
            match self.credentials.load(profile)? {
                Some(stored) => format!("profile '{}': {}", profile, stored.source.describe()),
                None => {
                    return Err(ApiError::ConfigError(format!(
                        "No credentials found for profile '{}'. Run `folderseed credentials set`",
                        profile
                    )))
                }
            }
        };

        let rt = Self::runtime()?;
        let report = rt.block_on(async {
            let gateway = self.drive_gateway().await?;
            let account = gateway.about().await?;
            let access = self
                .orchestrator(gateway, self.config.clone())
                .check_access()
                .await?;
            Ok::<_, ApiError>(CheckReport {
                credentials,
                account,
                access,
            })
        })?;

        if format == "json" {
            to_json(&report)
        } else {
            Ok(format_check_text(&report))
        }
    }

    /// Handle credentials subcommands
    fn handle_credentials(&self, command: &CredentialCommands) -> Result<String, ApiError> {
        match command {
            CredentialCommands::Set {
                profile,
                service_account,
                token,
                env,
                command,
            } => {
                let profile = profile
                    .clone()
                    .unwrap_or_else(|| self.config.credentials.profile.clone());
                if let Some(path) = service_account {
                    let source = CredentialSource::ServiceAccount {
                        key: Self::read_service_account_key(path)?,
                    };
                    return self.handle_credentials_set(&profile, source);
                }
                let source = match (token, env, command.as_slice()) {
                    (Some(token), _, _) => CredentialSource::Token {
                        access_token: token.clone(),
                    },
                    (None, Some(variable), _) => CredentialSource::Env {
                        variable: variable.clone(),
                    },
                    (None, None, [program, args @ ..]) => CredentialSource::Command {
                        program: program.clone(),
                        args: args.to_vec(),
                    },
                    (None, None, []) => Self::prompt_credential_source()?,
                };
                self.handle_credentials_set(&profile, source)
            }
            CredentialCommands::Show { format } => self.handle_credentials_show(format),
            CredentialCommands::Delete { profile, force } => {
                let profile = profile
                    .clone()
                    .unwrap_or_else(|| self.config.credentials.profile.clone());
                if !*force && !Self::confirm(&format!("Delete credential profile '{}'?", profile))? {
                    return Ok("Deletion cancelled".to_string());
                }
                self.credentials.delete(&profile)?;
                Ok(format!("Deleted credential profile: {}", profile))
            }
        }
    }

    fn read_service_account_key(path: &Path) -> Result<ServiceAccountKey, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        ServiceAccountKey::from_json(&raw)
    }

    fn handle_credentials_set(
        &self,
        profile: &str,
        source: CredentialSource,
    ) -> Result<String, ApiError> {
        let described = source.describe();
        let path = self
            .credentials
            .store(profile, &CredentialProfile::new(source))?;
        Ok(format!(
            "Stored credential profile '{}' ({})\nFile: {}",
            profile,
            described,
            path.display()
        ))
    }

    fn handle_credentials_show(&self, format: &str) -> Result<String, ApiError> {
        Self::check_format(format)?;
        let entries = self.credentials.list()?;
        let env_override = std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|v| !v.trim().is_empty());
        if format == "json" {
            let rows: Vec<serde_json::Value> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "profile": e.profile,
                        "active": e.profile == self.config.credentials.profile,
                        "source": e.credential.source.describe(),
                        "created_at": e.credential.created_at,
                        "path": e.path,
                    })
                })
                .collect();
            return to_json(&serde_json::json!({
                "env_override": env_override,
                "profiles": rows,
            }));
        }
        Ok(format_credentials_text(
            &entries,
            &self.config.credentials.profile,
            env_override,
        ))
    }

    /// Interactive credential setup
    fn prompt_credential_source() -> Result<CredentialSource, ApiError> {
        use dialoguer::{Input, Password, Select};

        let selection = Select::new()
            .with_prompt("Where should the Drive access token come from?")
            .items(&[
                "Service account key file (JSON)",
                "Command (e.g. gcloud auth print-access-token)",
                "Environment variable",
                "Paste a token",
            ])
            .default(0)
            .interact()
            .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;

        let source = match selection {
            0 => {
                let path: String = Input::new()
                    .with_prompt("Key file path")
                    .interact_text()
                    .map_err(|e| {
                        ApiError::ConfigError(format!("Failed to get user input: {}", e))
                    })?;
                CredentialSource::ServiceAccount {
                    key: Self::read_service_account_key(Path::new(path.trim()))?,
                }
            }
            1 => {
                let line: String = Input::new()
                    .with_prompt("Command")
                    .default("gcloud auth print-access-token".to_string())
                    .interact_text()
                    .map_err(|e| {
                        ApiError::ConfigError(format!("Failed to get user input: {}", e))
                    })?;
                let mut parts = line.split_whitespace().map(str::to_string);
                let program = parts.next().unwrap_or_default();
                CredentialSource::Command {
                    program,
                    args: parts.collect(),
                }
            }
            2 => {
                let variable: String = Input::new()
                    .with_prompt("Variable name")
                    .default(ACCESS_TOKEN_ENV.to_string())
                    .interact_text()
                    .map_err(|e| {
                        ApiError::ConfigError(format!("Failed to get user input: {}", e))
                    })?;
                CredentialSource::Env { variable }
            }
            _ => {
                let access_token = Password::new()
                    .with_prompt("Access token")
                    .interact()
                    .map_err(|e| {
                        ApiError::ConfigError(format!("Failed to get user input: {}", e))
                    })?;
                CredentialSource::Token { access_token }
            }
        };
        source.validate()?;
        Ok(source)
    }
}
