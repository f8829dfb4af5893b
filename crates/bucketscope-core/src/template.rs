//! Variable substitution applied right before a query executes.
//!
//! The host owns the actual variable service; this module only decides
//! which fields go through it. Resolution runs on every execution request
//! and nothing is cached.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use derive_more::Deref;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::TRACING_TARGET_TEMPLATE;
use crate::query::{BUCKET, PREFIX, QueryModel};
use crate::value::FieldValue;

/// `${name}`, `[[name]]` or `$name`.
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(\w+)\}|\[\[(\w+)\]\]|\$(\w+)").expect("variable pattern is valid")
});

/// Rewrites template placeholders in a text.
pub trait VariableResolver {
    /// Returns `text` with every placeholder replaced.
    fn substitute(&self, text: &str) -> String;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> String,
{
    fn substitute(&self, text: &str) -> String {
        self(text)
    }
}

/// A variable service that has to be awaited.
#[async_trait]
pub trait AsyncVariableResolver: Send + Sync {
    /// Returns `text` with every placeholder replaced.
    async fn substitute(&self, text: &str) -> String;
}

#[async_trait]
impl AsyncVariableResolver for VariableMap {
    async fn substitute(&self, text: &str) -> String {
        VariableResolver::substitute(self, text)
    }
}

/// A fixed set of variable values.
///
/// Understands `$name`, `${name}` and `[[name]]`. Unknown variables are
/// left as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct VariableMap(BTreeMap<String, String>);

impl VariableMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }
}

impl<K, V> FromIterator<(K, V)> for VariableMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl VariableResolver for VariableMap {
    fn substitute(&self, text: &str) -> String {
        VARIABLE
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|name| name.as_str())
                    .unwrap_or_default();
                match self.0.get(name) {
                    Some(value) => value.clone(),
                    None => caps[0].to_owned(),
                }
            })
            .into_owned()
    }
}

/// A defaulted, variable-resolved query, ready for the backend.
///
/// Serializes as the host's flat JSON object, passthrough keys included.
/// Numbers that failed to parse are kept as their `"NaN"` marker and listed
/// by [`ExecutionQuery::invalid_fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deref)]
#[serde(transparent)]
pub struct ExecutionQuery {
    #[deref]
    object: Map<String, Value>,
    #[serde(skip)]
    invalid_fields: Vec<&'static str>,
}

impl ExecutionQuery {
    /// Returns the resolved bucket.
    pub fn bucket(&self) -> &str {
        self.text(BUCKET)
    }

    /// Returns the resolved key prefix.
    pub fn prefix(&self) -> &str {
        self.text(PREFIX)
    }

    fn text(&self, name: &str) -> &str {
        self.object.get(name).and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns the numeric fields holding a number that failed to parse.
    ///
    /// Backends must reject or skip these rather than read them as zero.
    pub fn invalid_fields(&self) -> &[&'static str] {
        &self.invalid_fields
    }

    /// Returns the JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.object
    }
}

/// A defaulted copy of the query and its templated field values.
struct Pending {
    object: Map<String, Value>,
    templated: Vec<(&'static str, String)>,
    invalid_fields: Vec<&'static str>,
}

impl Pending {
    fn new(query: &QueryModel) -> Self {
        let defaulted = query.with_defaults();
        let record = defaulted.record();
        let templated = record
            .schema()
            .templated_fields()
            .map(|spec| (spec.name, record.text(spec.name)))
            .collect();
        let invalid_fields: Vec<_> = record
            .schema()
            .field_names()
            .filter(|name| record.get(name).is_some_and(FieldValue::is_invalid_number))
            .collect();

        if !invalid_fields.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_TEMPLATE,
                variant = %query.variant(),
                fields = ?invalid_fields,
                "executing a query with numbers that are not valid"
            );
        }

        Self {
            object: record.to_json_object(),
            templated,
            invalid_fields,
        }
    }

    fn finish(mut self, resolved: Vec<(&'static str, String)>) -> ExecutionQuery {
        for (name, value) in resolved {
            self.object.insert(name.to_owned(), Value::String(value));
        }
        ExecutionQuery {
            object: self.object,
            invalid_fields: self.invalid_fields,
        }
    }
}

/// Derives the execution query from `query`.
///
/// Defaults are applied first, so an absent `prefix` is resolved as `"/"`.
/// Non-empty templated fields (`bucket`, `prefix`) then go through
/// `resolver`; empty ones become `""` without calling it. `query` is not
/// modified.
pub fn resolve<R>(query: &QueryModel, resolver: &R) -> ExecutionQuery
where
    R: VariableResolver + ?Sized,
{
    let pending = Pending::new(query);
    let resolved = pending
        .templated
        .iter()
        .map(|(name, text)| {
            let value = if text.is_empty() {
                String::new()
            } else {
                resolver.substitute(text)
            };
            (*name, value)
        })
        .collect();

    tracing::debug!(
        target: TRACING_TARGET_TEMPLATE,
        variant = %query.variant(),
        "resolved template variables"
    );

    pending.finish(resolved)
}

/// Asynchronous counterpart of [`resolve`].
///
/// Each non-empty templated field is awaited once, one after another.
pub async fn resolve_async<R>(query: &QueryModel, resolver: &R) -> ExecutionQuery
where
    R: AsyncVariableResolver + ?Sized,
{
    let pending = Pending::new(query);
    let mut resolved = Vec::with_capacity(pending.templated.len());
    for (name, text) in &pending.templated {
        let value = if text.is_empty() {
            String::new()
        } else {
            resolver.substitute(text).await
        };
        resolved.push((*name, value));
    }

    tracing::debug!(
        target: TRACING_TARGET_TEMPLATE,
        variant = %query.variant(),
        "resolved template variables"
    );

    pending.finish(resolved)
}
