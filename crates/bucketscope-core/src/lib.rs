#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for data source settings edits and decoding.
pub const TRACING_TARGET_SETTINGS: &str = "bucketscope_core::settings";

/// Tracing target for query edits and partition planning.
pub const TRACING_TARGET_QUERY: &str = "bucketscope_core::query";

/// Tracing target for field edit conversion.
pub const TRACING_TARGET_EDIT: &str = "bucketscope_core::edit";

/// Tracing target for template variable resolution.
pub const TRACING_TARGET_TEMPLATE: &str = "bucketscope_core::template";

mod error;

pub mod defaults;
pub mod edit;
pub mod query;
pub mod record;
pub mod schema;
pub mod settings;
pub mod template;
pub mod value;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, Error, ErrorKind, Result};
