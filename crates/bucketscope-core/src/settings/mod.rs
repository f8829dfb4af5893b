//! Data source instance settings.
//!
//! Settings are split into a plaintext record (`jsonData`) and write-only
//! secrets. The client never learns a stored secret, only whether one is
//! configured; see [`SecureField`].

mod connection;
mod model;
mod secure;

use strum::{AsRefStr, Display, IntoStaticStr};

pub use self::connection::{ConnectionSettings, CredentialSource};
pub use self::model::{DataSourceSettings, PersistedSettings, SavePayload};
pub use self::secure::{SecretChange, SecretState, SecretValue, SecureField};
use crate::defaults;
use crate::schema::{ChoiceOption, FieldSpec, Schema};

/// Name of the authentication provider field.
pub const AUTHENTICATION_PROVIDER: &str = "authenticationProvider";

/// Name of the access key id field.
pub const ACCESS_KEY_ID: &str = "accessKeyId";

/// Name of the endpoint override field.
pub const ENDPOINT: &str = "endpoint";

/// Name of the secret access key.
pub const SECRET_ACCESS_KEY: &str = "secretAccessKey";

/// Authentication provider options, in display order.
pub const AUTH_PROVIDER_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new(AuthProvider::SdkDefault.ordinal(), "AWS SDK Default")
        .with_description("Authentication with Assume Role"),
    ChoiceOption::new(AuthProvider::AccessKeys.ordinal(), "Access & Secret Keys")
        .with_description("Authentication with Access Key ID and Secret Access Key"),
];

pub(crate) const AUTH_PROVIDER_FIELD: FieldSpec =
    FieldSpec::choice(AUTHENTICATION_PROVIDER, "Authentication Provider", AUTH_PROVIDER_OPTIONS)
        .with_default(defaults::AUTHENTICATION_PROVIDER);

const SETTINGS_FIELDS: &[FieldSpec] = &[
    AUTH_PROVIDER_FIELD,
    FieldSpec::text(ACCESS_KEY_ID, "Access Key ID")
        .visible_when(AUTHENTICATION_PROVIDER, AuthProvider::AccessKeys.ordinal()),
    FieldSpec::text(ENDPOINT, "Endpoint"),
];

/// Schema of the plaintext settings record.
pub static SETTINGS_SCHEMA: Schema = Schema::new("settings", SETTINGS_FIELDS);

/// How the backend obtains storage credentials.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthProvider {
    /// The SDK default credential chain (environment, profile, assumed role).
    #[default]
    SdkDefault,
    /// A static access key id and secret access key.
    AccessKeys,
}

impl AuthProvider {
    /// Returns the ordinal stored in `jsonData`.
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::SdkDefault => 0,
            Self::AccessKeys => 1,
        }
    }

    /// Maps a raw ordinal to a provider, failing open to the SDK default.
    pub fn from_ordinal(raw: Option<i64>) -> Self {
        match AUTH_PROVIDER_FIELD.coerce_ordinal(raw) {
            1 => Self::AccessKeys,
            _ => Self::SdkDefault,
        }
    }
}

/// Masks an access key id for logging.
///
/// Shows the first four characters followed by asterisks, or only asterisks
/// for keys of four characters or fewer.
pub fn mask_access_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let head: String = key.chars().take(4).collect();
        format!("{head}***")
    }
}
