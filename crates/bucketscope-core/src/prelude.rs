//! Convenient re-exports for common use.

pub use crate::edit::{EditOutcome, Editor, ExecuteIntent, FieldEdit, RawValue, Snapshot};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::query::partition::{Granularity, PartitionPlan, PrefixPattern};
pub use crate::query::{Metric, QueryModel, QueryVariant};
pub use crate::settings::{
    AuthProvider, ConnectionSettings, CredentialSource, DataSourceSettings, PersistedSettings,
    SavePayload, SecretChange, SecretState,
};
pub use crate::template::{
    AsyncVariableResolver, ExecutionQuery, VariableMap, VariableResolver, resolve, resolve_async,
};
