//! Command implementations.
//!
//! Every command reads its snapshot from a JSON file, applies the requested
//! edits through the core edit protocol and returns a JSON document that
//! `main` prints on stdout.

mod query;
mod settings;

use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
pub use query::QueryCommand;
use serde::Serialize;
use serde_json::Value;
pub use settings::SettingsCommand;

use crate::TRACING_TARGET_COMMAND;

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Edit data source settings or inspect their connection.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Edit, resolve or plan a query.
    #[command(subcommand)]
    Query(QueryCommand),
}

impl Command {
    /// Returns the command name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Settings(command) => command.name(),
            Self::Query(command) => command.name(),
        }
    }

    /// Validates the command arguments.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Settings(command) => command.validate(),
            Self::Query(command) => command.validate(),
        }
    }

    /// Logs the command arguments (no sensitive information).
    pub fn log(&self) {
        match self {
            Self::Settings(command) => command.log(),
            Self::Query(command) => command.log(),
        }
    }

    /// Runs the command and returns its output document.
    pub async fn execute(&self) -> anyhow::Result<Value> {
        match self {
            Self::Settings(command) => command.execute(read_env).await,
            Self::Query(command) => command.execute().await,
        }
    }
}

/// Reads an environment variable, treating unset and non-unicode alike.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Reads a JSON file, returning `None` when it does not exist.
pub(crate) async fn read_json_file(path: &Path) -> anyhow::Result<Option<Value>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::info!(
                target: TRACING_TARGET_COMMAND,
                path = %path.display(),
                "file not found, starting from an empty snapshot"
            );
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let json = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {} as JSON", path.display()))?;
    Ok(Some(json))
}

/// Writes `value` as pretty-printed JSON.
pub(crate) async fn write_json_file(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    let mut text = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
    text.push('\n');
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        path = %path.display(),
        "snapshot written"
    );
    Ok(())
}
