//! Query definitions.
//!
//! A query is a [`Record`](crate::record::Record) over the schema of one
//! [`QueryVariant`]. All variants share the templated `bucket` and `prefix`
//! fields; richer variants add the aggregation metric and the streaming
//! controls.

mod metric;
mod model;
pub mod partition;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

pub use self::metric::{METRIC_OPTIONS, Metric};
pub use self::model::QueryModel;
use crate::defaults;
use crate::schema::{FieldSpec, Schema};

/// Name of the bucket field.
pub const BUCKET: &str = "bucket";

/// Name of the key prefix field.
pub const PREFIX: &str = "prefix";

/// Name of the metric field.
pub const METRIC: &str = "metric";

/// Name of the free-form query text field.
pub const QUERY_TEXT: &str = "queryText";

/// Name of the synthetic constant field.
pub const CONSTANT: &str = "constant";

/// Name of the streaming switch.
pub const WITH_STREAMING: &str = "withStreaming";

const BUCKET_FIELD: FieldSpec = FieldSpec::text(BUCKET, "Bucket")
    .with_default(defaults::BUCKET)
    .templated();

const PREFIX_FIELD: FieldSpec = FieldSpec::text(PREFIX, "Prefix")
    .with_default(defaults::PREFIX)
    .templated();

const METRIC_FIELD: FieldSpec =
    FieldSpec::choice(METRIC, "Metric", METRIC_OPTIONS).with_default(defaults::METRIC);

const PARTITION_FIELDS: &[FieldSpec] = &[BUCKET_FIELD, PREFIX_FIELD];

const METRIC_FIELDS: &[FieldSpec] = &[BUCKET_FIELD, PREFIX_FIELD, METRIC_FIELD];

const STREAMING_FIELDS: &[FieldSpec] = &[
    BUCKET_FIELD,
    PREFIX_FIELD,
    METRIC_FIELD,
    FieldSpec::text(QUERY_TEXT, "Query Text"),
    FieldSpec::number(CONSTANT, "Constant")
        .with_default(defaults::CONSTANT)
        .live(),
    FieldSpec::flag(WITH_STREAMING, "With Streaming")
        .with_default(defaults::WITH_STREAMING)
        .live(),
];

/// Schema of partition queries.
pub static PARTITION_SCHEMA: Schema = Schema::new("partition_query", PARTITION_FIELDS);

/// Schema of metric queries.
pub static METRIC_SCHEMA: Schema = Schema::new("metric_query", METRIC_FIELDS);

/// Schema of streaming queries.
pub static STREAMING_SCHEMA: Schema = Schema::new("streaming_query", STREAMING_FIELDS);

/// The shape of a query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryVariant {
    /// Bucket and prefix only.
    Partition,
    /// Bucket, prefix and aggregation metric.
    #[default]
    Metric,
    /// Metric query plus free text, a constant and a streaming switch.
    Streaming,
}

impl QueryVariant {
    /// Returns the schema of this variant.
    pub fn schema(self) -> &'static Schema {
        match self {
            Self::Partition => &PARTITION_SCHEMA,
            Self::Metric => &METRIC_SCHEMA,
            Self::Streaming => &STREAMING_SCHEMA,
        }
    }
}
