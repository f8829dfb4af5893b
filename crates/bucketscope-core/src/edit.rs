//! Field edit protocol.
//!
//! Editing surfaces send one [`FieldEdit`] per user input. A [`Snapshot`]
//! merges the edit into a new full snapshot and never mutates the previous
//! one; the result is an [`EditOutcome`] that also says whether the edit
//! asks the host to execute the query right away.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::schema::{FieldKind, FieldSpec};
use crate::value::FieldValue;
use crate::{Error, Result, TRACING_TARGET_EDIT};

/// Leading decimal literal accepted by [`parse_numeric`].
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("numeric prefix pattern is valid")
});

/// The raw payload of a field edit, as produced by an input widget.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Text typed into an input.
    Text(String),
    /// Text typed into a numeric input, parsed on merge.
    NumericText(String),
    /// State of a switch.
    Flag(bool),
    /// Selected option ordinal; `None` when the selection was cleared.
    Ordinal(Option<i64>),
}

impl RawValue {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::NumericText(_) => "numeric text",
            Self::Flag(_) => "flag",
            Self::Ordinal(_) => "ordinal",
        }
    }

    /// Converts the raw payload into a value for the field `spec`.
    ///
    /// Text aimed at a numeric field is parsed with [`parse_numeric`],
    /// text aimed at a choice field is read as an ordinal and coerced.
    ///
    /// # Errors
    ///
    /// Fails only when the payload can never describe a value of the
    /// field's kind, e.g. a switch state for a text field.
    pub fn into_field_value(self, spec: &FieldSpec) -> Result<FieldValue> {
        match (spec.kind, self) {
            (FieldKind::Text, Self::Text(text) | Self::NumericText(text)) => {
                Ok(FieldValue::Text(text))
            }
            (FieldKind::Number, Self::Text(text) | Self::NumericText(text)) => {
                let number = parse_numeric(&text);
                if number.is_nan() {
                    tracing::warn!(
                        target: TRACING_TARGET_EDIT,
                        field = spec.name,
                        raw = %text,
                        "numeric input did not parse, storing NaN"
                    );
                }
                Ok(FieldValue::Number(number))
            }
            (FieldKind::Flag, Self::Flag(flag)) => Ok(FieldValue::Flag(flag)),
            (FieldKind::Flag, Self::Text(text)) => text
                .trim()
                .parse::<bool>()
                .map(FieldValue::Flag)
                .map_err(|_| Error::kind_mismatch(spec.name, "flag", "text")),
            (FieldKind::Choice(_), Self::Ordinal(ordinal)) => {
                Ok(FieldValue::Choice(coerce_choice(spec, ordinal)))
            }
            (FieldKind::Choice(_), Self::Text(text) | Self::NumericText(text)) => Ok(
                FieldValue::Choice(coerce_choice(spec, text.trim().parse::<i64>().ok())),
            ),
            (kind, raw) => Err(Error::kind_mismatch(spec.name, kind.name(), raw.kind_name())),
        }
    }
}

pub(crate) fn coerce_choice(spec: &FieldSpec, raw: Option<i64>) -> u8 {
    let ordinal = spec.coerce_ordinal(raw);
    if raw != Some(i64::from(ordinal)) {
        tracing::debug!(
            target: TRACING_TARGET_EDIT,
            field = spec.name,
            raw = ?raw,
            ordinal,
            "undeclared option, using default"
        );
    }
    ordinal
}

/// Parses numeric input the way browser number inputs do.
///
/// Leading whitespace is skipped and the longest leading decimal literal is
/// used (`"12px"` reads as `12`). Input without such a prefix yields `NaN`,
/// which is stored as-is so that consumers can see the invalid state.
pub fn parse_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let Some(literal) = NUMERIC_PREFIX.find(trimmed) else {
        return f64::NAN;
    };

    match literal.as_str() {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        literal => literal.parse().unwrap_or(f64::NAN),
    }
}

/// A single-field edit event.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    /// Name of the edited field.
    pub field: String,
    /// New raw value.
    pub value: RawValue,
}

impl FieldEdit {
    /// Creates a new edit.
    pub fn new(field: impl Into<String>, value: RawValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Creates a text edit.
    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(field, RawValue::Text(text.into()))
    }

    /// Creates a numeric text edit.
    pub fn numeric(field: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::new(field, RawValue::NumericText(raw.into()))
    }

    /// Creates a switch edit.
    pub fn flag(field: impl Into<String>, flag: bool) -> Self {
        Self::new(field, RawValue::Flag(flag))
    }

    /// Creates an option selection edit.
    pub fn ordinal(field: impl Into<String>, ordinal: Option<i64>) -> Self {
        Self::new(field, RawValue::Ordinal(ordinal))
    }
}

impl FromStr for FieldEdit {
    type Err = Error;

    /// Parses `field=value`; the value is kept as raw text and interpreted
    /// according to the target field's kind on merge.
    fn from_str(s: &str) -> Result<Self> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| Error::invalid_edit(format!("expected 'field=value', got '{s}'")))?;

        let field = field.trim();
        if field.is_empty() {
            return Err(Error::invalid_edit(format!("missing field name in '{s}'")));
        }

        Ok(Self::text(field, value))
    }
}

/// What the host should do after merging an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteIntent {
    /// Execute the current query immediately.
    RunQuery,
}

/// The merged snapshot plus the optional execution intent of an edit.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "the merged snapshot replaces the previous one"]
pub struct EditOutcome<S> {
    /// The new full snapshot.
    pub snapshot: S,
    /// Set when the edit asks for immediate execution.
    pub intent: Option<ExecuteIntent>,
}

impl<S> EditOutcome<S> {
    /// An outcome without execution intent.
    pub fn quiet(snapshot: S) -> Self {
        Self {
            snapshot,
            intent: None,
        }
    }

    /// An outcome asking the host to run the query.
    pub fn run(snapshot: S) -> Self {
        Self {
            snapshot,
            intent: Some(ExecuteIntent::RunQuery),
        }
    }

    /// Returns whether the edit asked for immediate execution.
    pub fn should_run(&self) -> bool {
        self.intent.is_some()
    }
}

/// A state snapshot that accepts single-field edits.
pub trait Snapshot: Clone {
    /// Merges one edit into a new snapshot.
    ///
    /// # Errors
    ///
    /// Fails only for contract violations (unknown field, impossible value
    /// kind); the receiver is never modified.
    fn apply(&self, edit: &FieldEdit) -> Result<EditOutcome<Self>>;
}

/// Owner of exactly one snapshot, replaced wholesale on every edit.
#[derive(Debug, Clone)]
pub struct Editor<S> {
    current: S,
    revision: u64,
}

impl<S: Snapshot> Editor<S> {
    /// Starts editing from `snapshot`.
    pub fn new(snapshot: S) -> Self {
        Self {
            current: snapshot,
            revision: 0,
        }
    }

    /// Returns the current snapshot.
    #[inline]
    pub fn snapshot(&self) -> &S {
        &self.current
    }

    /// Returns how many snapshots replaced the initial one.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Merges `edit` and replaces the current snapshot with the result.
    ///
    /// On error the current snapshot is kept.
    pub fn dispatch(&mut self, edit: &FieldEdit) -> Result<Option<ExecuteIntent>> {
        let outcome = self.current.apply(edit)?;
        self.replace(outcome.snapshot);
        Ok(outcome.intent)
    }

    /// Replaces the current snapshot with one derived from it.
    ///
    /// Used for actions that are not field edits, such as resetting a
    /// secret.
    pub fn update(&mut self, f: impl FnOnce(&S) -> S) {
        let next = f(&self.current);
        self.replace(next);
    }

    /// Finishes editing and returns the last snapshot.
    pub fn into_snapshot(self) -> S {
        self.current
    }

    fn replace(&mut self, next: S) {
        self.current = next;
        self.revision += 1;
    }
}
