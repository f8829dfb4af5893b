//! `settings` commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use bucketscope_core::edit::{Editor, FieldEdit};
use bucketscope_core::settings::{
    ConnectionSettings, DataSourceSettings, PersistedSettings, SECRET_ACCESS_KEY,
    SETTINGS_SCHEMA,
};
use clap::{Args, Subcommand};
use serde_json::{Value, json};

use super::{read_json_file, write_json_file};
use crate::TRACING_TARGET_COMMAND;

/// Settings commands.
#[derive(Debug, Clone, Subcommand)]
pub enum SettingsCommand {
    /// Apply field edits and print the save payload.
    Edit(EditSettingsArgs),
    /// Decode the connection settings the backend would use.
    Connection(ConnectionArgs),
}

/// Arguments of `settings edit`.
///
/// The secret is reset first (if requested), then edits are applied in
/// order, then the new secret is typed in.
#[derive(Debug, Clone, Args)]
pub struct EditSettingsArgs {
    /// Persisted settings file with `jsonData` and `secureJsonFields`.
    ///
    /// A missing file starts from fresh settings.
    #[arg(long, env = "BUCKETSCOPE_SETTINGS")]
    pub state: PathBuf,

    /// Plaintext field edit, e.g. `accessKeyId=AKIA...`. Repeatable.
    #[arg(long = "edit", value_name = "FIELD=VALUE")]
    pub edits: Vec<FieldEdit>,

    /// Name of the environment variable holding a new secret access key.
    #[arg(long, env = "BUCKETSCOPE_SECRET_ENV", value_name = "VAR")]
    pub secret_env: Option<String>,

    /// Reset the stored secret access key.
    #[arg(long)]
    pub reset_secret: bool,

    /// Write the post-save state back to the settings file.
    #[arg(long)]
    pub commit: bool,

    /// Print secret values in the payload instead of masking them.
    #[arg(long)]
    pub reveal_payload: bool,
}

/// Arguments of `settings connection`.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Persisted settings file with `jsonData` and `secureJsonFields`.
    #[arg(long, env = "BUCKETSCOPE_SETTINGS")]
    pub state: PathBuf,

    /// Name of the environment variable holding the decrypted secret
    /// access key.
    #[arg(long, env = "BUCKETSCOPE_SECRET_ENV", value_name = "VAR")]
    pub secret_env: Option<String>,
}

impl SettingsCommand {
    /// Returns the command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit(_) => "settings edit",
            Self::Connection(_) => "settings connection",
        }
    }

    /// Validates the arguments.
    pub fn validate(&self) -> anyhow::Result<()> {
        let Self::Edit(args) = self else {
            return Ok(());
        };

        if args.edits.iter().any(|edit| edit.field == SECRET_ACCESS_KEY) {
            return Err(anyhow!(
                "'{SECRET_ACCESS_KEY}' cannot be set with --edit, use --secret-env"
            ));
        }
        Ok(())
    }

    /// Logs the arguments.
    pub fn log(&self) {
        match self {
            Self::Edit(args) => tracing::debug!(
                target: TRACING_TARGET_COMMAND,
                state = %args.state.display(),
                edits = args.edits.len(),
                new_secret = args.secret_env.is_some(),
                reset_secret = args.reset_secret,
                commit = args.commit,
                "settings edit"
            ),
            Self::Connection(args) => tracing::debug!(
                target: TRACING_TARGET_COMMAND,
                state = %args.state.display(),
                with_secret = args.secret_env.is_some(),
                "settings connection"
            ),
        }
    }

    /// Runs the command, reading secrets through `env`.
    pub async fn execute(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Value> {
        match self {
            Self::Edit(args) => args.execute(env).await,
            Self::Connection(args) => args.execute(env).await,
        }
    }
}

fn read_secret(env: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<String> {
    env(name).ok_or_else(|| anyhow!("environment variable '{name}' is not set"))
}

async fn load_settings(path: &std::path::Path) -> anyhow::Result<Option<PersistedSettings>> {
    let Some(json) = read_json_file(path).await? else {
        return Ok(None);
    };
    let persisted = serde_json::from_value(json)
        .with_context(|| format!("{} is not a settings document", path.display()))?;
    Ok(Some(persisted))
}

impl EditSettingsArgs {
    async fn execute(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Value> {
        let persisted = load_settings(&self.state).await?.unwrap_or_default();
        let secret = self
            .secret_env
            .as_deref()
            .map(|name| read_secret(&env, name))
            .transpose()?;

        let settings = self.apply(&persisted, secret)?;
        let payload = settings.save_payload();

        if self.commit {
            let saved = persisted.after_save(&payload);
            write_json_file(&self.state, &saved).await?;
        }

        let payload = if self.reveal_payload {
            serde_json::to_value(&payload).context("failed to encode save payload")?
        } else {
            payload.to_redacted_json()
        };

        let mut visible: Vec<&str> = SETTINGS_SCHEMA
            .field_names()
            .filter(|name| settings.is_visible(name))
            .collect();
        if settings.is_visible(SECRET_ACCESS_KEY) {
            visible.push(SECRET_ACCESS_KEY);
        }

        Ok(json!({
            "payload": payload,
            "secretState": settings.secret_state().as_ref(),
            "visibleFields": visible,
        }))
    }

    fn apply(
        &self,
        persisted: &PersistedSettings,
        secret: Option<String>,
    ) -> anyhow::Result<DataSourceSettings> {
        let settings =
            DataSourceSettings::hydrate(persisted).context("failed to load persisted settings")?;
        let mut editor = Editor::new(settings);

        if self.reset_secret {
            editor.update(DataSourceSettings::reset_secret);
        }
        for edit in &self.edits {
            editor
                .dispatch(edit)
                .with_context(|| format!("failed to edit '{}'", edit.field))?;
        }
        if let Some(secret) = secret {
            editor.update(|settings| settings.apply_secret_edit(secret));
        }

        tracing::info!(
            target: TRACING_TARGET_COMMAND,
            revisions = editor.revision(),
            secret_state = editor.snapshot().secret_state().as_ref(),
            "settings edited"
        );

        Ok(editor.into_snapshot())
    }
}

impl ConnectionArgs {
    async fn execute(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Value> {
        let persisted = load_settings(&self.state)
            .await?
            .ok_or_else(|| anyhow!("{} does not exist", self.state.display()))?;

        let mut decrypted = BTreeMap::new();
        if let Some(name) = &self.secret_env {
            decrypted.insert(SECRET_ACCESS_KEY.to_owned(), read_secret(&env, name)?);
        }

        let json_data = serde_json::to_vec(&persisted.json_data).context("failed to encode jsonData")?;
        let connection = ConnectionSettings::decode(&json_data, &decrypted)
            .context("failed to decode connection settings")?;

        Ok(json!({
            "provider": connection.auth_provider().as_ref(),
            "endpoint": connection.endpoint().map(|url| url.as_str()),
            "summary": connection.to_string(),
        }))
    }
}
