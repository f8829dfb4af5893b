//! Settings snapshot, hydration and save payload.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::secure::{SecretChange, SecretState, SecretValue, SecureField};
use super::{
    ACCESS_KEY_ID, AUTH_PROVIDER_FIELD, AUTHENTICATION_PROVIDER, AuthProvider, ENDPOINT,
    SECRET_ACCESS_KEY, SETTINGS_SCHEMA, mask_access_key,
};
use crate::edit::{EditOutcome, FieldEdit, RawValue, Snapshot};
use crate::record::Record;
use crate::schema::Visibility;
use crate::value::FieldValue;
use crate::{Error, Result, TRACING_TARGET_SETTINGS};

/// Settings as persisted by the host.
///
/// There is no member for secret values: the host only reports which
/// secrets are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    /// Plaintext settings.
    #[serde(default)]
    pub json_data: Map<String, Value>,
    /// Presence flag per secret name.
    #[serde(default)]
    pub secure_json_fields: BTreeMap<String, bool>,
}

impl PersistedSettings {
    /// Returns `true` if the host reports the secret `name` as stored.
    pub fn is_configured(&self, name: &str) -> bool {
        self.secure_json_fields.get(name).copied().unwrap_or(false)
    }

    /// Returns the host state after `payload` was saved successfully.
    ///
    /// Secret values are dropped; only the presence flags change.
    pub fn after_save(&self, payload: &SavePayload) -> Self {
        let mut secure_json_fields = self.secure_json_fields.clone();
        match payload.secret_change() {
            SecretChange::Keep => {}
            SecretChange::Store(_) => {
                secure_json_fields.insert(SECRET_ACCESS_KEY.to_owned(), true);
            }
            SecretChange::Delete => {
                secure_json_fields.remove(SECRET_ACCESS_KEY);
            }
        }

        Self {
            json_data: payload.json_data().clone(),
            secure_json_fields,
        }
    }
}

/// What the host persists on save.
///
/// Serializes as `{"jsonData": {..}, "secureJsonData": {..}}` where
/// `secureJsonData` lists only changed secrets, with `""` meaning delete.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePayload {
    json_data: Map<String, Value>,
    secret_access_key: SecretChange,
}

impl SavePayload {
    /// Returns the full plaintext settings.
    pub fn json_data(&self) -> &Map<String, Value> {
        &self.json_data
    }

    /// Returns the change to the secret access key.
    pub fn secret_change(&self) -> &SecretChange {
        &self.secret_access_key
    }

    /// Returns the changed secrets with their wire values.
    pub fn secure_json_data(&self) -> BTreeMap<&'static str, &str> {
        let mut secure = BTreeMap::new();
        match &self.secret_access_key {
            SecretChange::Keep => {}
            SecretChange::Store(value) => {
                secure.insert(SECRET_ACCESS_KEY, value.expose());
            }
            SecretChange::Delete => {
                secure.insert(SECRET_ACCESS_KEY, "");
            }
        }
        secure
    }

    /// Returns the wire form with stored secret values replaced by `***`.
    pub fn to_redacted_json(&self) -> Value {
        let secure: Map<String, Value> = self
            .secure_json_data()
            .into_iter()
            .map(|(name, value)| {
                let shown = if value.is_empty() { "" } else { "***" };
                (name.to_owned(), Value::from(shown))
            })
            .collect();

        let mut object = Map::new();
        object.insert("jsonData".to_owned(), Value::Object(self.json_data.clone()));
        if !secure.is_empty() {
            object.insert("secureJsonData".to_owned(), Value::Object(secure));
        }
        Value::Object(object)
    }
}

impl Serialize for SavePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let secure = self.secure_json_data();
        let mut state = serializer.serialize_struct("SavePayload", 2)?;
        state.serialize_field("jsonData", &self.json_data)?;
        if secure.is_empty() {
            state.skip_field("secureJsonData")?;
        } else {
            state.serialize_field("secureJsonData", &secure)?;
        }
        state.end()
    }
}

/// The settings snapshot edited on the configuration screen.
///
/// Every operation returns a new snapshot and leaves the receiver as it
/// was.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceSettings {
    json_data: Record,
    secret_access_key: SecureField,
}

impl Default for DataSourceSettings {
    fn default() -> Self {
        Self {
            json_data: Record::empty(&SETTINGS_SCHEMA),
            secret_access_key: SecureField::default(),
        }
    }
}

impl DataSourceSettings {
    /// Creates settings for a fresh instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrates the snapshot from the host's persisted settings.
    ///
    /// # Errors
    ///
    /// Fails when `jsonData` members have JSON types the schema cannot
    /// hold.
    pub fn hydrate(persisted: &PersistedSettings) -> Result<Self> {
        let json_data = Record::from_json(
            &SETTINGS_SCHEMA,
            &Value::Object(persisted.json_data.clone()),
        )?;

        let settings = Self {
            json_data,
            secret_access_key: SecureField::hydrated(persisted.is_configured(SECRET_ACCESS_KEY)),
        };

        tracing::debug!(
            target: TRACING_TARGET_SETTINGS,
            provider = %settings.auth_provider(),
            access_key_id = %settings.access_key_id_masked(),
            secret_state = settings.secret_state().as_ref(),
            "hydrated data source settings"
        );

        Ok(settings)
    }

    /// Returns the plaintext record.
    #[inline]
    pub fn json_data(&self) -> &Record {
        &self.json_data
    }

    /// Returns the configured authentication provider.
    pub fn auth_provider(&self) -> AuthProvider {
        let ordinal = self
            .json_data
            .effective(AUTHENTICATION_PROVIDER)
            .and_then(|value| value.as_choice());
        AuthProvider::from_ordinal(ordinal.map(i64::from))
    }

    /// Returns the access key id, or `""`.
    pub fn access_key_id(&self) -> String {
        self.json_data.text(ACCESS_KEY_ID)
    }

    /// Returns the access key id masked for logging.
    pub fn access_key_id_masked(&self) -> String {
        mask_access_key(&self.access_key_id())
    }

    /// Returns the endpoint override, or `""` for the service default.
    pub fn endpoint(&self) -> String {
        self.json_data.text(ENDPOINT)
    }

    /// Returns the secret access key state.
    #[inline]
    pub fn secret(&self) -> &SecureField {
        &self.secret_access_key
    }

    /// Returns the secret access key lifecycle state.
    pub fn secret_state(&self) -> SecretState {
        self.secret_access_key.state()
    }

    /// Returns whether the configuration screen shows the field `name`.
    ///
    /// Key fields are only shown for the access key provider.
    pub fn is_visible(&self, name: &str) -> bool {
        if name == SECRET_ACCESS_KEY {
            return self.json_data.visibility_holds(Visibility::WhenChoice {
                field: AUTHENTICATION_PROVIDER,
                ordinal: AuthProvider::AccessKeys.ordinal(),
            });
        }
        self.json_data.is_visible(name)
    }

    /// Returns a snapshot with exactly one plaintext field replaced.
    ///
    /// # Errors
    ///
    /// Fails for names outside the plaintext schema (including the secret
    /// itself) and for raw values that cannot target the field's kind.
    pub fn apply_plain_field_edit(&self, field: &str, value: RawValue) -> Result<Self> {
        let spec = SETTINGS_SCHEMA.require(field)?;
        let value = value.into_field_value(spec)?;

        tracing::debug!(
            target: TRACING_TARGET_SETTINGS,
            field = spec.name,
            "plaintext setting edited"
        );

        Ok(Self {
            json_data: self.json_data.with_field(spec, value),
            secret_access_key: self.secret_access_key.clone(),
        })
    }

    /// Returns a snapshot with the authentication provider replaced.
    ///
    /// Missing or undeclared ordinals select the SDK default.
    pub fn apply_auth_provider_edit(&self, ordinal: Option<i64>) -> Self {
        let provider = AuthProvider::from_ordinal(ordinal);

        tracing::debug!(
            target: TRACING_TARGET_SETTINGS,
            raw = ?ordinal,
            provider = %provider,
            "authentication provider edited"
        );

        Self {
            json_data: self
                .json_data
                .with_field(&AUTH_PROVIDER_FIELD, FieldValue::Choice(provider.ordinal())),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    /// Returns a snapshot with the pending secret access key replaced.
    ///
    /// Whether a secret is configured does not change until the next save.
    pub fn apply_secret_edit(&self, value: impl Into<SecretValue>) -> Self {
        Self {
            json_data: self.json_data.clone(),
            secret_access_key: self.secret_access_key.with_pending(value.into()),
        }
    }

    /// Returns a snapshot whose secret access key is reset.
    ///
    /// The next save deletes the stored secret unless a new one is typed.
    pub fn reset_secret(&self) -> Self {
        tracing::info!(
            target: TRACING_TARGET_SETTINGS,
            was_configured = self.secret_access_key.is_configured(),
            "secret access key reset"
        );

        Self {
            json_data: self.json_data.clone(),
            secret_access_key: self.secret_access_key.reset(),
        }
    }

    /// Builds the payload handed to the host on save.
    ///
    /// `jsonData` is the full defaulted plaintext record; the secret is
    /// included only when it changed this session.
    pub fn save_payload(&self) -> SavePayload {
        let payload = SavePayload {
            json_data: self.json_data.with_defaults().to_json_object(),
            secret_access_key: self.secret_access_key.change(),
        };

        tracing::debug!(
            target: TRACING_TARGET_SETTINGS,
            provider = %self.auth_provider(),
            access_key_id = %self.access_key_id_masked(),
            secret_change = payload.secret_access_key.as_ref(),
            "built save payload"
        );

        payload
    }
}

impl Snapshot for DataSourceSettings {
    fn apply(&self, edit: &FieldEdit) -> Result<EditOutcome<Self>> {
        let snapshot = match (edit.field.as_str(), &edit.value) {
            (SECRET_ACCESS_KEY, RawValue::Text(value) | RawValue::NumericText(value)) => {
                self.apply_secret_edit(value.as_str())
            }
            (SECRET_ACCESS_KEY, _) => {
                return Err(Error::kind_mismatch(SECRET_ACCESS_KEY, "secret", "non-text"));
            }
            (AUTHENTICATION_PROVIDER, RawValue::Ordinal(ordinal)) => {
                self.apply_auth_provider_edit(*ordinal)
            }
            (field, value) => self.apply_plain_field_edit(field, value.clone())?,
        };

        Ok(EditOutcome::quiet(snapshot))
    }
}
