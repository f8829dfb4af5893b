//! Connection settings decoded on the backend side.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use url::Url;

use super::secure::SecretValue;
use super::{AuthProvider, SECRET_ACCESS_KEY, mask_access_key};
use crate::{Error, Result, TRACING_TARGET_SETTINGS};

/// Plaintext members read by the backend.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConnection {
    authentication_provider: i64,
    access_key_id: String,
    endpoint: String,
}

/// Where the storage client takes its credentials from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// The SDK default credential chain.
    SdkDefault,
    /// A static key pair.
    Static {
        /// Access key id.
        access_key_id: String,
        /// Secret access key; empty when none is stored.
        secret_access_key: SecretValue,
    },
}

/// Everything a storage client needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    credentials: CredentialSource,
    endpoint: Option<Url>,
}

impl ConnectionSettings {
    /// Decodes an instance's `jsonData` and its decrypted secrets.
    ///
    /// Unknown members are ignored. With the access key provider the secret
    /// is taken from `decrypted`, and left empty when it is missing there.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConnection`](crate::ErrorKind) when
    /// `json_data` is empty or malformed, or when the endpoint is not an
    /// `http(s)` URL.
    pub fn decode(json_data: &[u8], decrypted: &BTreeMap<String, String>) -> Result<Self> {
        if json_data.is_empty() {
            return Err(Error::invalid_connection("instance settings carry no jsonData"));
        }

        let raw: RawConnection = serde_json::from_slice(json_data).map_err(|err| {
            tracing::warn!(
                target: TRACING_TARGET_SETTINGS,
                error = %err,
                "failed to decode instance settings"
            );
            Error::invalid_connection("malformed jsonData").with_source(err)
        })?;

        let provider = AuthProvider::from_ordinal(Some(raw.authentication_provider));
        let credentials = match provider {
            AuthProvider::AccessKeys => {
                let secret = decrypted.get(SECRET_ACCESS_KEY);
                if secret.is_none() {
                    tracing::warn!(
                        target: TRACING_TARGET_SETTINGS,
                        access_key_id = %mask_access_key(&raw.access_key_id),
                        "access key provider without a stored secret access key"
                    );
                }
                CredentialSource::Static {
                    access_key_id: raw.access_key_id,
                    secret_access_key: secret.map(String::as_str).unwrap_or_default().into(),
                }
            }
            AuthProvider::SdkDefault => CredentialSource::SdkDefault,
        };

        let endpoint = parse_endpoint(&raw.endpoint)?;
        let settings = Self {
            credentials,
            endpoint,
        };

        tracing::info!(
            target: TRACING_TARGET_SETTINGS,
            provider = %settings.auth_provider(),
            endpoint = settings.endpoint().map(Url::as_str).unwrap_or("default"),
            "decoded connection settings"
        );

        Ok(settings)
    }

    /// Returns the credential source.
    #[inline]
    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// Returns the endpoint override.
    ///
    /// When set, clients must address it as given and not rewrite the
    /// hostname with the bucket name.
    #[inline]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Returns the authentication provider the credentials came from.
    pub fn auth_provider(&self) -> AuthProvider {
        match self.credentials {
            CredentialSource::SdkDefault => AuthProvider::SdkDefault,
            CredentialSource::Static { .. } => AuthProvider::AccessKeys,
        }
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider={}", self.auth_provider())?;
        if let CredentialSource::Static {
            access_key_id,
            secret_access_key,
        } = &self.credentials
        {
            let secret = if secret_access_key.is_empty() { "missing" } else { "set" };
            write!(
                f,
                " access_key_id={} secret_access_key={secret}",
                mask_access_key(access_key_id)
            )?;
        }
        match &self.endpoint {
            Some(endpoint) => write!(f, " endpoint={endpoint}"),
            None => write!(f, " endpoint=default"),
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<Option<Url>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(raw).map_err(|err| {
        Error::invalid_connection(format!("endpoint '{raw}' is not a valid URL")).with_source(err)
    })?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(Some(url)),
        _ => Err(Error::invalid_connection(format!(
            "endpoint '{raw}' must be an http(s) URL with a host"
        ))),
    }
}
