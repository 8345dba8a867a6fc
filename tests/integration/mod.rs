//! Integration tests for template replication

mod cli_contracts;
mod concurrency;
mod config_layers;
mod properties;
mod scenarios;
mod support;
