//! Declarative field schemas.
//!
//! Every snapshot shape (data source settings and each query variant) is a
//! [`Schema`]: an ordered list of [`FieldSpec`]s naming the field, its
//! [`FieldKind`], its default, when it is visible, and how edits to it
//! behave. A single generic [`Record`](crate::record::Record) stores values
//! for any schema.

use crate::value::FieldValue;
use crate::{Error, Result};

/// One option of a choice field, as presented by the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Ordinal stored in the snapshot.
    pub value: u8,
    /// Human readable label.
    pub label: &'static str,
    /// Optional longer description.
    pub description: Option<&'static str>,
}

impl ChoiceOption {
    /// Creates a new choice option.
    pub const fn new(value: u8, label: &'static str) -> Self {
        Self {
            value,
            label,
            description: None,
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// The type of values a field holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Floating-point number.
    Number,
    /// Boolean switch.
    Flag,
    /// One of a fixed set of ordinals.
    Choice(&'static [ChoiceOption]),
}

impl FieldKind {
    /// Returns a short name of the kind, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Flag => "flag",
            Self::Choice(_) => "choice",
        }
    }

    /// Returns whether `value` can be stored in a field of this kind.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Text, FieldValue::Text(_))
                | (Self::Number, FieldValue::Number(_))
                | (Self::Flag, FieldValue::Flag(_))
                | (Self::Choice(_), FieldValue::Choice(_))
        )
    }
}

/// A compile-time default value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// Text default.
    Text(&'static str),
    /// Numeric default.
    Number(f64),
    /// Boolean default.
    Flag(bool),
    /// Choice ordinal default.
    Choice(u8),
}

impl DefaultValue {
    /// Materializes the default as a field value.
    pub fn to_value(self) -> FieldValue {
        match self {
            Self::Text(text) => FieldValue::Text(text.to_owned()),
            Self::Number(number) => FieldValue::Number(number),
            Self::Flag(flag) => FieldValue::Flag(flag),
            Self::Choice(ordinal) => FieldValue::Choice(ordinal),
        }
    }
}

/// When a field is shown by the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Always shown.
    Always,
    /// Shown only while a choice field holds the given ordinal.
    WhenChoice {
        /// The controlling choice field.
        field: &'static str,
        /// The ordinal that makes this field visible.
        ordinal: u8,
    },
}

/// Declaration of a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Field name, as it appears in the JSON snapshot.
    pub name: &'static str,
    /// Label shown by the editing surface.
    pub label: &'static str,
    /// Value kind.
    pub kind: FieldKind,
    /// Value taken when the field is absent.
    pub default: Option<DefaultValue>,
    /// Visibility predicate.
    pub visibility: Visibility,
    /// Edits of a live field ask the host to run the query immediately.
    pub live: bool,
    /// Templated fields go through variable substitution before execution.
    pub templated: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            default: None,
            visibility: Visibility::Always,
            live: false,
            templated: false,
        }
    }

    /// Declares a text field.
    pub const fn text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    /// Declares a numeric field.
    pub const fn number(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Number)
    }

    /// Declares a boolean field.
    pub const fn flag(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Flag)
    }

    /// Declares a choice field over `options`.
    pub const fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [ChoiceOption],
    ) -> Self {
        Self::new(name, label, FieldKind::Choice(options))
    }

    /// Sets the default value.
    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Makes the field visible only while `field` holds `ordinal`.
    pub const fn visible_when(mut self, field: &'static str, ordinal: u8) -> Self {
        self.visibility = Visibility::WhenChoice { field, ordinal };
        self
    }

    /// Marks the field as live.
    pub const fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Marks the field as templated.
    pub const fn templated(mut self) -> Self {
        self.templated = true;
        self
    }

    /// Returns the choice options of a choice field.
    pub fn options(&self) -> &'static [ChoiceOption] {
        match self.kind {
            FieldKind::Choice(options) => options,
            _ => &[],
        }
    }

    /// Maps a raw ordinal to a declared option, failing open to the default.
    ///
    /// Missing or undeclared ordinals yield the field's default, or the
    /// first declared option when the field has no choice default.
    pub fn coerce_ordinal(&self, raw: Option<i64>) -> u8 {
        let options = self.options();
        let declared = raw.and_then(|raw| {
            options
                .iter()
                .find(|option| i64::from(option.value) == raw)
                .map(|option| option.value)
        });

        declared.unwrap_or_else(|| match self.default {
            Some(DefaultValue::Choice(ordinal)) => ordinal,
            _ => options.first().map(|option| option.value).unwrap_or(0),
        })
    }
}

/// An ordered set of field declarations.
#[derive(Debug, PartialEq)]
pub struct Schema {
    /// Schema name, used in logs and error messages.
    pub name: &'static str,
    /// Declared fields, in display order.
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Creates a new schema.
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().find(|spec| spec.name == name)
    }

    /// Looks up a field by name, failing for undeclared names.
    pub fn require(&self, name: &str) -> Result<&'static FieldSpec> {
        self.field(name)
            .ok_or_else(|| Error::unknown_field(self.name, name))
    }

    /// Returns whether the schema declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterates over the declared field names.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|spec| spec.name)
    }

    /// Iterates over the fields rewritten by variable substitution.
    pub fn templated_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().filter(|spec| spec.templated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const OPTIONS: &[ChoiceOption] = &[
        ChoiceOption::new(0, "Zero"),
        ChoiceOption::new(1, "One").with_description("the second one"),
    ];

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::choice("mode", "Mode", OPTIONS).with_default(DefaultValue::Choice(0)),
        FieldSpec::text("name", "Name").visible_when("mode", 1).templated(),
        FieldSpec::number("rate", "Rate").live(),
    ];

    static SCHEMA: Schema = Schema::new("test", FIELDS);

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(SCHEMA.field("name").map(|spec| spec.label), Some("Name"));
        assert!(SCHEMA.contains("rate"));
        assert!(!SCHEMA.contains("missing"));
        assert_eq!(
            SCHEMA.field_names().collect::<Vec<_>>(),
            vec!["mode", "name", "rate"]
        );
    }

    #[test]
    fn test_require_reports_unknown_field() {
        let err = SCHEMA.require("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
    }

    #[test]
    fn test_coerce_ordinal_fails_open_to_default() {
        let mode = SCHEMA.field("mode").unwrap();
        assert_eq!(mode.coerce_ordinal(Some(1)), 1);
        assert_eq!(mode.coerce_ordinal(Some(7)), 0);
        assert_eq!(mode.coerce_ordinal(Some(-1)), 0);
        assert_eq!(mode.coerce_ordinal(None), 0);
    }

    #[test]
    fn test_builder_flags() {
        let name = SCHEMA.field("name").unwrap();
        assert!(name.templated);
        assert!(!name.live);
        assert_eq!(
            name.visibility,
            Visibility::WhenChoice {
                field: "mode",
                ordinal: 1
            }
        );
        assert!(SCHEMA.field("rate").unwrap().live);
        assert_eq!(SCHEMA.templated_fields().count(), 1);
    }

    #[test]
    fn test_kind_accepts_matching_values() {
        assert!(FieldKind::Text.accepts(&FieldValue::from("x")));
        assert!(!FieldKind::Text.accepts(&FieldValue::from(1.0)));
        assert!(FieldKind::Choice(OPTIONS).accepts(&FieldValue::Choice(1)));
    }
}
