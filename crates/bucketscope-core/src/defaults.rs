//! Default values for under-specified settings and queries.

use crate::schema::DefaultValue;

/// Bucket used when a query names none.
pub const DEFAULT_BUCKET: &str = "";

/// Key prefix used when a query names none.
pub const DEFAULT_PREFIX: &str = "/";

/// Ordinal of the default aggregation metric (size in bytes).
pub const DEFAULT_METRIC: u8 = 0;

/// Seed value of the synthetic constant series.
pub const DEFAULT_CONSTANT: f64 = 6.5;

/// Streaming is off unless requested.
pub const DEFAULT_WITH_STREAMING: bool = false;

/// Ordinal of the default authentication provider (SDK default chain).
pub const DEFAULT_AUTHENTICATION_PROVIDER: u8 = 0;

pub(crate) const BUCKET: DefaultValue = DefaultValue::Text(DEFAULT_BUCKET);
pub(crate) const PREFIX: DefaultValue = DefaultValue::Text(DEFAULT_PREFIX);
pub(crate) const METRIC: DefaultValue = DefaultValue::Choice(DEFAULT_METRIC);
pub(crate) const CONSTANT: DefaultValue = DefaultValue::Number(DEFAULT_CONSTANT);
pub(crate) const WITH_STREAMING: DefaultValue = DefaultValue::Flag(DEFAULT_WITH_STREAMING);
pub(crate) const AUTHENTICATION_PROVIDER: DefaultValue =
    DefaultValue::Choice(DEFAULT_AUTHENTICATION_PROVIDER);
