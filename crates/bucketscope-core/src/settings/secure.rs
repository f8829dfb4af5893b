//! Write-only secret fields.

use std::fmt;

use strum::{AsRefStr, IntoStaticStr};

/// A secret value typed during the current session.
///
/// The content is never printed: both [`Debug`] and [`Display`] mask it,
/// and the type is not `Serialize`. It leaves the model only
/// through [`SavePayload`](super::SavePayload).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret content.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if nothing was typed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Lifecycle of a secret within one editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SecretState {
    /// No secret is stored, or it was reset this session.
    Unset,
    /// A secret is stored server-side; the client only knows that.
    Configured,
    /// A new value was typed and will be stored on save.
    Editing,
}

/// What the next save does with a stored secret.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SecretChange {
    /// Leave the stored secret as it is.
    Keep,
    /// Store or replace the secret.
    Store(SecretValue),
    /// Delete the stored secret.
    Delete,
}

/// One secret of the settings model.
///
/// For a secret persisted in an earlier session only the `configured` flag
/// exists; a value can only enter through [`SecureField::with_pending`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecureField {
    configured: bool,
    pending: Option<SecretValue>,
    reset_requested: bool,
}

impl SecureField {
    /// Creates the field from the host's presence flag.
    pub fn hydrated(configured: bool) -> Self {
        Self {
            configured,
            ..Self::default()
        }
    }

    /// Returns `true` if the host reported a stored secret and it was not
    /// reset since.
    #[inline]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Returns the value typed this session, if any.
    #[inline]
    pub fn pending(&self) -> Option<&SecretValue> {
        self.pending.as_ref()
    }

    /// Returns `true` if the secret was reset this session.
    #[inline]
    pub fn is_reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Replaces the pending value. The configured flag is unchanged.
    pub fn with_pending(&self, value: SecretValue) -> Self {
        Self {
            pending: Some(value),
            ..self.clone()
        }
    }

    /// Clears the configured flag and the pending value.
    ///
    /// There is no way back within a session: the user has to type the
    /// secret again.
    pub fn reset(&self) -> Self {
        Self {
            configured: false,
            pending: None,
            reset_requested: true,
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SecretState {
        match (&self.pending, self.configured) {
            (Some(value), _) if !value.is_empty() => SecretState::Editing,
            (_, true) => SecretState::Configured,
            (_, false) => SecretState::Unset,
        }
    }

    /// Returns what the next save does with the stored secret.
    pub fn change(&self) -> SecretChange {
        match &self.pending {
            Some(value) if !value.is_empty() => SecretChange::Store(value.clone()),
            _ if self.reset_requested => SecretChange::Delete,
            _ => SecretChange::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_is_masked() {
        let value = SecretValue::new("shh");
        assert_eq!(format!("{value}"), "***");
        assert_eq!(format!("{value:?}"), "SecretValue(***)");
        assert_eq!(value.expose(), "shh");
    }

    #[test]
    fn test_hydrated_field_holds_no_value() {
        let field = SecureField::hydrated(true);
        assert!(field.is_configured());
        assert!(field.pending().is_none());
        assert_eq!(field.state(), SecretState::Configured);
        assert_eq!(field.change(), SecretChange::Keep);
    }

    #[test]
    fn test_pending_value_keeps_configured_flag() {
        let field = SecureField::hydrated(true).with_pending("new".into());
        assert!(field.is_configured());
        assert_eq!(field.state(), SecretState::Editing);
        assert_eq!(field.change(), SecretChange::Store("new".into()));

        let cleared = field.with_pending(SecretValue::default());
        assert_eq!(cleared.state(), SecretState::Configured);
        assert_eq!(cleared.change(), SecretChange::Keep);
    }

    #[test]
    fn test_reset_signals_delete_until_retyped() {
        let field = SecureField::hydrated(true).with_pending("x".into()).reset();
        assert!(!field.is_configured());
        assert!(field.pending().is_none());
        assert_eq!(field.state(), SecretState::Unset);
        assert_eq!(field.change(), SecretChange::Delete);

        let retyped = field.with_pending("y".into());
        assert!(!retyped.is_configured());
        assert_eq!(retyped.change(), SecretChange::Store("y".into()));

        let cleared = retyped.with_pending("".into());
        assert_eq!(cleared.change(), SecretChange::Delete);
    }

    #[test]
    fn test_unset_field_without_edits_keeps() {
        let field = SecureField::default();
        assert_eq!(field.state(), SecretState::Unset);
        assert_eq!(field.change(), SecretChange::Keep);
        assert_eq!(SecretChange::Delete.as_ref(), "delete");
    }
}
