//! Tooling & Integration Layer
//!
//! The command-line front end: argument parsing, interactive prompts, console
//! progress and text/JSON rendering on top of the workspace orchestrator.

pub mod cli;
pub mod format;
pub mod progress;

pub use cli::{Cli, CliContext, CommandOutput, Commands, CredentialCommands};
pub use progress::ConsoleProgress;
