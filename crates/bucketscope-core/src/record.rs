//! Generic schema-backed snapshot record.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::edit::coerce_choice;
use crate::schema::{FieldKind, FieldSpec, Schema, Visibility};
use crate::value::FieldValue;
use crate::{Error, Result};

/// An immutable set of field values for one [`Schema`].
///
/// Only fields that were actually supplied are present; absent fields fall
/// back to their schema default when read through [`Record::effective`] or
/// after [`Record::with_defaults`]. JSON keys the schema does not declare
/// (host bookkeeping such as `refId`) are carried through untouched.
#[derive(Clone)]
pub struct Record {
    schema: &'static Schema,
    values: BTreeMap<&'static str, FieldValue>,
    extra: Map<String, Value>,
}

impl Record {
    /// Creates a record with no field present.
    pub fn empty(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Returns the schema this record conforms to.
    #[inline]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the value of a present field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Returns whether the field was supplied, including falsy values.
    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the present value, or the schema default for absent fields.
    pub fn effective(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned().or_else(|| {
            self.schema
                .field(name)
                .and_then(|spec| spec.default)
                .map(|default| default.to_value())
        })
    }

    /// Returns the effective text of a text field, or `""`.
    pub fn text(&self, name: &str) -> String {
        match self.effective(name) {
            Some(FieldValue::Text(text)) => text,
            _ => String::new(),
        }
    }

    /// Returns the host keys not declared by the schema.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns a new record with exactly one field replaced.
    ///
    /// The receiver is left untouched.
    ///
    /// # Errors
    ///
    /// Fails when the schema does not declare `name` or when `value` is of
    /// the wrong kind.
    pub fn with_value(&self, name: &str, value: FieldValue) -> Result<Self> {
        let spec = self.schema.require(name)?;
        if !spec.kind.accepts(&value) {
            return Err(Error::kind_mismatch(
                name,
                spec.kind.name(),
                value.kind_name(),
            ));
        }

        Ok(self.with_field(spec, value))
    }

    /// Replaces one field whose kind the caller already checked.
    pub(crate) fn with_field(&self, spec: &FieldSpec, value: FieldValue) -> Self {
        debug_assert!(spec.kind.accepts(&value));
        let mut next = self.clone();
        next.values.insert(spec.name, value);
        next
    }

    /// Returns a copy where every absent field with a default takes it.
    ///
    /// Present values always win, even falsy ones such as an empty prefix.
    /// Applying this twice yields the same record.
    pub fn with_defaults(&self) -> Self {
        let mut next = self.clone();
        for spec in self.schema.fields {
            if let Some(default) = spec.default {
                next.values
                    .entry(spec.name)
                    .or_insert_with(|| default.to_value());
            }
        }
        next
    }

    /// Returns whether the editing surface should show the field.
    pub fn is_visible(&self, name: &str) -> bool {
        match self.schema.field(name) {
            Some(spec) => self.visibility_holds(spec.visibility),
            None => false,
        }
    }

    /// Evaluates a visibility predicate against this record.
    pub fn visibility_holds(&self, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Always => true,
            Visibility::WhenChoice { field, ordinal } => {
                self.effective(field).and_then(|value| value.as_choice()) == Some(ordinal)
            }
        }
    }

    /// Iterates over the fields currently shown by the editing surface.
    pub fn visible_fields(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        let fields: &'static [FieldSpec] = self.schema.fields;
        fields
            .iter()
            .filter(|spec| self.visibility_holds(spec.visibility))
    }

    /// Decodes a record from a JSON object.
    ///
    /// `null` members count as absent. Numeric members may hold the string
    /// markers of non-finite numbers. Choice members that do not name a
    /// declared option fail open to the default.
    ///
    /// # Errors
    ///
    /// Fails when `json` is not an object or a declared text, number or
    /// flag member has a JSON type that cannot represent the field kind.
    pub fn from_json(schema: &'static Schema, json: &Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            Error::invalid_snapshot(format!("'{}' snapshot must be a JSON object", schema.name))
        })?;

        let mut record = Self::empty(schema);
        for (key, member) in object {
            let Some(spec) = schema.field(key) else {
                record.extra.insert(key.clone(), member.clone());
                continue;
            };
            if member.is_null() {
                continue;
            }
            record.values.insert(spec.name, decode_member(spec, member)?);
        }

        Ok(record)
    }

    /// Encodes the present fields and passthrough keys as a JSON map.
    pub fn to_json_object(&self) -> Map<String, Value> {
        let mut object = self.extra.clone();
        for (name, value) in &self.values {
            object.insert((*name).to_owned(), value.to_json());
        }
        object
    }

    /// Encodes the present fields and passthrough keys as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_object())
    }
}

fn decode_member(spec: &FieldSpec, member: &Value) -> Result<FieldValue> {
    let value = match (spec.kind, member) {
        (FieldKind::Text, Value::String(text)) => Some(FieldValue::Text(text.clone())),
        (FieldKind::Number, Value::Number(number)) => number.as_f64().map(FieldValue::Number),
        (FieldKind::Number, Value::String(marker)) => {
            FieldValue::number_from_marker(marker).map(FieldValue::Number)
        }
        (FieldKind::Flag, Value::Bool(flag)) => Some(FieldValue::Flag(*flag)),
        (FieldKind::Choice(_), member) => {
            Some(FieldValue::Choice(coerce_choice(spec, member_ordinal(member))))
        }
        _ => None,
    };

    value.ok_or_else(|| {
        Error::invalid_snapshot(format!(
            "member '{}' cannot hold a {} value: {member}",
            spec.name,
            spec.kind.name()
        ))
    })
}

/// Reads a stored choice member as an ordinal.
///
/// Hosts may store custom values, so digit strings and integral floats are
/// accepted; anything else has no ordinal.
fn member_ordinal(member: &Value) -> Option<i64> {
    match member {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() <= i64::MAX as f64)
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema)
            && self.values == other.values
            && self.extra == other.extra
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.name)
            .field("values", &self.values)
            .field("extra", &self.extra)
            .finish()
    }
}
