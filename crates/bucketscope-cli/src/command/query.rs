//! `query` commands.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use bucketscope_core::edit::{Editor, ExecuteIntent, FieldEdit};
use bucketscope_core::query::partition::{PartitionPlan, PrefixPattern};
use bucketscope_core::query::{METRIC, QueryModel, QueryVariant};
use bucketscope_core::template::{ExecutionQuery, VariableMap, resolve_async};
use clap::{Args, Subcommand};
use jiff::civil::DateTime;
use serde_json::{Value, json};

use super::{read_json_file, write_json_file};
use crate::TRACING_TARGET_COMMAND;

/// Query commands.
#[derive(Debug, Clone, Subcommand)]
pub enum QueryCommand {
    /// Apply field edits to a query.
    Edit(EditQueryArgs),
    /// Resolve template variables into the execution query.
    Resolve(ResolveArgs),
    /// List the key prefixes a time range reads.
    Plan(PlanArgs),
}

/// Query file and variant shared by all query commands.
#[derive(Debug, Clone, Args)]
pub struct QueryInput {
    /// Query file as stored by the host. A missing file is an empty query.
    #[arg(long, env = "BUCKETSCOPE_QUERY")]
    pub query: PathBuf,

    /// Query variant.
    #[arg(long, env = "BUCKETSCOPE_QUERY_VARIANT", default_value_t = QueryVariant::Metric)]
    pub variant: QueryVariant,
}

impl QueryInput {
    async fn load(&self) -> anyhow::Result<QueryModel> {
        let Some(json) = read_json_file(&self.query).await? else {
            return Ok(QueryModel::new(self.variant));
        };
        QueryModel::from_json(self.variant, &json)
            .with_context(|| format!("{} is not a {} query", self.query.display(), self.variant))
    }

    async fn resolve(&self, variables: &[(String, String)]) -> anyhow::Result<ExecutionQuery> {
        let query = self.load().await?;
        let variables: VariableMap = variables.iter().cloned().collect();
        Ok(resolve_async(&query, &variables).await)
    }
}

/// Arguments of `query edit`.
#[derive(Debug, Clone, Args)]
pub struct EditQueryArgs {
    #[clap(flatten)]
    pub input: QueryInput,

    /// Field edit, e.g. `bucket=logs`. Repeatable, applied in order.
    #[arg(long = "edit", value_name = "FIELD=VALUE")]
    pub edits: Vec<FieldEdit>,

    /// Write the edited query back to the query file.
    #[arg(long)]
    pub write: bool,
}

/// Arguments of `query resolve`.
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    #[clap(flatten)]
    pub input: QueryInput,

    /// Template variable, e.g. `env=prod`. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,
}

/// Arguments of `query plan`.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[clap(flatten)]
    pub input: QueryInput,

    /// Template variable, e.g. `env=prod`. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    /// Start of the range (inclusive), e.g. `2024-01-01T00:00`.
    #[arg(long)]
    pub from: DateTime,

    /// End of the range (exclusive).
    #[arg(long)]
    pub to: DateTime,
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected 'name=value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_owned(), value.to_owned()))
}

impl QueryCommand {
    /// Returns the command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit(_) => "query edit",
            Self::Resolve(_) => "query resolve",
            Self::Plan(_) => "query plan",
        }
    }

    /// Validates the arguments.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Self::Plan(args) = self
            && args.to <= args.from
        {
            return Err(anyhow!(
                "--to ({}) must be after --from ({})",
                args.to,
                args.from
            ));
        }
        Ok(())
    }

    /// Logs the arguments.
    pub fn log(&self) {
        let input = self.input();
        tracing::debug!(
            target: TRACING_TARGET_COMMAND,
            command = self.name(),
            query = %input.query.display(),
            variant = %input.variant,
            "query command"
        );
    }

    fn input(&self) -> &QueryInput {
        match self {
            Self::Edit(args) => &args.input,
            Self::Resolve(args) => &args.input,
            Self::Plan(args) => &args.input,
        }
    }

    /// Runs the command.
    pub async fn execute(&self) -> anyhow::Result<Value> {
        match self {
            Self::Edit(args) => args.execute().await,
            Self::Resolve(args) => {
                let resolved = args.input.resolve(&args.variables).await?;
                serde_json::to_value(&resolved).context("failed to encode execution query")
            }
            Self::Plan(args) => args.execute().await,
        }
    }
}

impl EditQueryArgs {
    async fn execute(&self) -> anyhow::Result<Value> {
        let query = self.input.load().await?;
        let mut editor = Editor::new(query);

        let mut run_query = false;
        for edit in &self.edits {
            let intent = editor
                .dispatch(edit)
                .with_context(|| format!("failed to edit '{}'", edit.field))?;
            run_query |= intent == Some(ExecuteIntent::RunQuery);
        }

        let query = editor.into_snapshot();
        if self.write {
            write_json_file(&self.input.query, &query.to_json()).await?;
        }

        let invalid_fields = invalid_number_fields(&query);
        if !invalid_fields.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_COMMAND,
                fields = ?invalid_fields,
                "query holds numbers that are not valid"
            );
        }

        Ok(json!({
            "query": query.to_json(),
            "runQuery": run_query,
            "invalidFields": invalid_fields,
        }))
    }
}

fn invalid_number_fields(query: &QueryModel) -> Vec<&'static str> {
    let record = query.record();
    record
        .schema()
        .field_names()
        .filter(|name| record.get(name).is_some_and(|value| value.is_invalid_number()))
        .collect()
}

impl PlanArgs {
    async fn execute(&self) -> anyhow::Result<Value> {
        let resolved = self.input.resolve(&self.variables).await?;
        let pattern = PrefixPattern::parse(resolved.prefix())
            .with_context(|| format!("invalid prefix '{}'", resolved.prefix()))?;
        let plan = PartitionPlan::new(&pattern, self.from, self.to)
            .context("failed to plan partitions")?;

        tracing::info!(
            target: TRACING_TARGET_COMMAND,
            bucket = resolved.bucket(),
            granularity = %plan.granularity(),
            partitions = plan.slots().len(),
            days = plan.by_day().len(),
            "planned query"
        );

        let metric = resolved.get(METRIC).cloned().unwrap_or(Value::Null);

        Ok(json!({
            "bucket": resolved.bucket(),
            "metric": metric,
            "plan": plan,
            "invalidFields": resolved.invalid_fields(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::datetime;

    use super::*;

    fn input(query: PathBuf, variant: QueryVariant) -> QueryInput {
        QueryInput { query, variant }
    }

    fn edits(raw: &[&str]) -> Vec<FieldEdit> {
        raw.iter().map(|edit| edit.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_edit_live_field_requests_run() {
        let dir = tempfile::tempdir().unwrap();
        let args = EditQueryArgs {
            input: input(dir.path().join("q.json"), QueryVariant::Streaming),
            edits: edits(&["bucket=logs", "constant=abc"]),
            write: false,
        };

        let output = args.execute().await.unwrap();
        assert_eq!(output["runQuery"], json!(true));
        assert_eq!(output["query"]["bucket"], json!("logs"));
        assert_eq!(output["query"]["constant"], json!("NaN"));
        assert_eq!(output["invalidFields"], json!(["constant"]));
    }

    #[tokio::test]
    async fn test_written_invalid_number_reaches_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let args = EditQueryArgs {
            input: input(path.clone(), QueryVariant::Streaming),
            edits: edits(&["constant=abc"]),
            write: true,
        };
        args.execute().await.unwrap();

        let saved = read_json_file(&path).await.unwrap().unwrap();
        assert_eq!(saved["constant"], json!("NaN"));

        let command = QueryCommand::Resolve(ResolveArgs {
            input: input(path, QueryVariant::Streaming),
            variables: Vec::new(),
        });
        let output = command.execute().await.unwrap();
        assert_eq!(output["constant"], json!("NaN"));
        assert_eq!(output["withStreaming"], json!(false));
    }

    #[tokio::test]
    async fn test_edit_plain_field_is_quiet_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        tokio::fs::write(&path, r#"{"bucket":"old","refId":"A"}"#)
            .await
            .unwrap();

        let args = EditQueryArgs {
            input: input(path.clone(), QueryVariant::Metric),
            edits: edits(&["bucket=new", "metric=1"]),
            write: true,
        };

        let output = args.execute().await.unwrap();
        assert_eq!(output["runQuery"], json!(false));
        assert_eq!(output["invalidFields"], json!([]));

        let saved = read_json_file(&path).await.unwrap().unwrap();
        assert_eq!(saved["bucket"], json!("new"));
        assert_eq!(saved["metric"], json!(1));
        assert_eq!(saved["refId"], json!("A"));
        assert!(saved.get("prefix").is_none());
    }

    #[tokio::test]
    async fn test_edit_unknown_field_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = EditQueryArgs {
            input: input(dir.path().join("q.json"), QueryVariant::Partition),
            edits: edits(&["constant=1"]),
            write: false,
        };
        assert!(args.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_defaults_and_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        tokio::fs::write(&path, r#"{"bucket":"${team}-logs"}"#)
            .await
            .unwrap();

        let command = QueryCommand::Resolve(ResolveArgs {
            input: input(path, QueryVariant::Metric),
            variables: vec![("team".to_owned(), "infra".to_owned())],
        });

        let output = command.execute().await.unwrap();
        assert_eq!(output["bucket"], json!("infra-logs"));
        assert_eq!(output["prefix"], json!("/"));
        assert_eq!(output["metric"], json!(0));
    }

    #[tokio::test]
    async fn test_plan_hourly_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        tokio::fs::write(
            &path,
            r#"{"bucket":"logs","prefix":"$env/<yyyy>/<MM>/<dd>/<HH>/"}"#,
        )
        .await
        .unwrap();

        let args = PlanArgs {
            input: input(path, QueryVariant::Partition),
            variables: vec![("env".to_owned(), "prod".to_owned())],
            from: datetime(2024, 1, 1, 22, 0, 0, 0),
            to: datetime(2024, 1, 2, 1, 0, 0, 0),
        };

        let output = args.execute().await.unwrap();
        assert_eq!(output["bucket"], json!("logs"));
        assert_eq!(output["invalidFields"], json!([]));
        assert_eq!(output["plan"]["granularity"], json!("hour"));

        let prefixes: Vec<&str> = output["plan"]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|slot| slot["prefix"].as_str().unwrap())
            .collect();
        assert_eq!(
            prefixes,
            vec![
                "prod/2024/01/01/22/",
                "prod/2024/01/01/23/",
                "prod/2024/01/02/00/",
            ]
        );
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let command = QueryCommand::Plan(PlanArgs {
            input: input(PathBuf::from("q.json"), QueryVariant::Partition),
            variables: Vec::new(),
            from: datetime(2024, 1, 2, 0, 0, 0, 0),
            to: datetime(2024, 1, 1, 0, 0, 0, 0),
        });
        assert!(command.validate().is_err());
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("env=a=b").unwrap(),
            ("env".to_owned(), "a=b".to_owned())
        );
        assert!(parse_variable("env").is_err());
        assert!(parse_variable("=x").is_err());
    }
}
