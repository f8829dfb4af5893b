//! Field values stored in a [`Record`](crate::record::Record).

use std::fmt;

use serde_json::Value;

/// The value of a single snapshot field.
///
/// Numbers are kept as `f64` so that an unparsable numeric edit can be
/// carried forward as `NaN` instead of being coerced to zero.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Floating-point number, possibly `NaN`.
    Number(f64),
    /// Boolean switch.
    Flag(bool),
    /// Ordinal of a choice option.
    Choice(u8),
}

impl FieldValue {
    /// Returns a short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Flag(_) => "flag",
            Self::Choice(_) => "choice",
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the number, if this is a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Returns the flag, if this is a boolean value.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the ordinal, if this is a choice value.
    pub fn as_choice(&self) -> Option<u8> {
        match self {
            Self::Choice(ordinal) => Some(*ordinal),
            _ => None,
        }
    }

    /// Returns `true` for a number that failed to parse.
    ///
    /// Downstream numeric consumers must treat this as an invalid state.
    pub fn is_invalid_number(&self) -> bool {
        matches!(self, Self::Number(number) if number.is_nan())
    }

    /// Converts the value to JSON.
    ///
    /// Non-finite numbers have no JSON number form and are emitted as the
    /// strings `"NaN"`, `"Infinity"` and `"-Infinity"`, which
    /// [`FieldValue::number_from_marker`] reads back.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(number) => match serde_json::Number::from_f64(*number) {
                Some(number) => Value::Number(number),
                None => Value::String(non_finite_marker(*number).to_owned()),
            },
            Self::Flag(flag) => Value::Bool(*flag),
            Self::Choice(ordinal) => Value::from(*ordinal),
        }
    }

    /// Parses the string form of a non-finite number.
    pub fn number_from_marker(marker: &str) -> Option<f64> {
        match marker {
            NAN_MARKER => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        }
    }
}

/// JSON form of a number that failed to parse.
pub const NAN_MARKER: &str = "NaN";

fn non_finite_marker(number: f64) -> &'static str {
    if number.is_nan() {
        NAN_MARKER
    } else if number.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::Choice(ordinal) => write!(f, "{ordinal}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_nan_is_invalid_and_serializes_as_marker() {
        let value = FieldValue::Number(f64::NAN);
        assert!(value.is_invalid_number());
        assert_eq!(value.to_json(), json!("NaN"));
        assert!(FieldValue::number_from_marker("NaN").is_some_and(f64::is_nan));
    }

    #[test]
    fn test_infinities_serialize_as_markers() {
        assert_eq!(FieldValue::Number(f64::INFINITY).to_json(), json!("Infinity"));
        assert_eq!(FieldValue::Number(f64::NEG_INFINITY).to_json(), json!("-Infinity"));
        assert_eq!(FieldValue::number_from_marker("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(FieldValue::number_from_marker("nan"), None);
        assert!(!FieldValue::Number(f64::INFINITY).is_invalid_number());
    }

    #[test]
    fn test_regular_values_to_json() {
        assert_eq!(FieldValue::from("logs").to_json(), json!("logs"));
        assert_eq!(FieldValue::from(6.5).to_json(), json!(6.5));
        assert_eq!(FieldValue::from(true).to_json(), json!(true));
        assert_eq!(FieldValue::Choice(1).to_json(), json!(1));
        assert!(!FieldValue::from(0.0).is_invalid_number());
    }

    #[test]
    fn test_accessors_match_kind() {
        let text = FieldValue::from("x");
        assert_eq!(text.as_text(), Some("x"));
        assert_eq!(text.as_number(), None);
        assert_eq!(text.kind_name(), "text");
        assert_eq!(FieldValue::Choice(0).as_choice(), Some(0));
        assert_eq!(FieldValue::Flag(false).as_flag(), Some(false));
    }
}
