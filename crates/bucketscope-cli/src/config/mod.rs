//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── logging: LoggingConfig   # log format and colors
//! └── command: Command
//!     ├── settings edit|connection
//!     └── query edit|resolve|plan
//! ```
//!
//! Options can be given as arguments or environment variables; secrets are
//! only ever read from environment variables.
//!
//! # Example
//!
//! ```bash
//! BUCKETSCOPE_SECRET=... bucketscope settings edit --state ds.json \
//!     --edit authenticationProvider=1 --edit accessKeyId=AKIA... \
//!     --secret-env BUCKETSCOPE_SECRET --commit
//! ```

mod logging;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use logging::{LogFormat, LoggingConfig};

use crate::command::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "bucketscope")]
#[command(about = "Edit object-storage data source settings and queries")]
#[command(version)]
pub struct Cli {
    /// Logging configuration.
    #[clap(flatten)]
    pub logging: LoggingConfig,

    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.command
            .validate()
            .with_context(|| format!("invalid '{}' command", self.command.name()))?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?Self::enabled_features(),
            "build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            log_format = %self.logging.log_format,
            command = self.command.name(),
            "cli configuration"
        );

        self.command.log();
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_edit() {
        let cli = Cli::try_parse_from([
            "bucketscope",
            "--log-format",
            "json",
            "query",
            "edit",
            "--query",
            "q.json",
            "--variant",
            "streaming",
            "--edit",
            "constant=abc",
        ])
        .unwrap();

        assert_eq!(cli.logging.log_format, LogFormat::Json);
        assert_eq!(cli.command.name(), "query edit");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_edit() {
        let result = Cli::try_parse_from([
            "bucketscope",
            "settings",
            "edit",
            "--state",
            "s.json",
            "--edit",
            "endpoint",
        ]);
        assert!(result.is_err());
    }
}
