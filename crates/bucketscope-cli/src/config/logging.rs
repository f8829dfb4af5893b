//! Logging configuration and tracing initialization.

use clap::{Args, ValueEnum};
use strum::{Display, EnumString};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log line format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
///
/// The log level is read from `RUST_LOG` and defaults to `info`. Logs go to
/// stderr so that command output on stdout stays machine readable.
#[derive(Debug, Clone, Args)]
#[must_use = "config does nothing unless you use it"]
pub struct LoggingConfig {
    /// Log line format.
    #[arg(long, env = "BUCKETSCOPE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Disables colored log output.
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,
}

impl LoggingConfig {
    /// Initializes the tracing subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is invalid or a subscriber is already
    /// installed.
    pub fn init_tracing(&self) -> anyhow::Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .map_err(|e| anyhow::anyhow!("failed to create env filter: {e}"))?;

        let json = self.log_format == LogFormat::Json;
        let text_layer = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_ansi(!self.no_color)
                .with_writer(std::io::stderr)
        });
        let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(text_layer)
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_names_match_cli_values() {
        for format in LogFormat::value_variants() {
            let name = format.to_string();
            assert_eq!(LogFormat::from_str(&name, false), Ok(*format));
            assert_eq!(name.parse::<LogFormat>(), Ok(*format));
        }
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
