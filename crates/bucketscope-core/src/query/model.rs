//! Query snapshot and its edit operations.

use serde_json::Value;

use super::{
    BUCKET, CONSTANT, METRIC, Metric, PREFIX, QUERY_TEXT, QueryVariant, WITH_STREAMING,
};
use crate::edit::{EditOutcome, FieldEdit, RawValue, Snapshot};
use crate::record::Record;
use crate::schema::FieldKind;
use crate::{Error, Result, TRACING_TARGET_QUERY};

/// A query definition of one [`QueryVariant`].
///
/// Hosts may hand over partial queries; consumers read them through
/// [`QueryModel::with_defaults`] so every defaulted field is present.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    variant: QueryVariant,
    record: Record,
}

impl QueryModel {
    /// Creates an empty query of the given variant.
    pub fn new(variant: QueryVariant) -> Self {
        Self {
            variant,
            record: Record::empty(variant.schema()),
        }
    }

    /// Decodes a query as given by the host, without applying defaults.
    ///
    /// # Errors
    ///
    /// Fails when `json` is not an object or a member has a JSON type the
    /// field cannot hold.
    pub fn from_json(variant: QueryVariant, json: &Value) -> Result<Self> {
        Ok(Self {
            variant,
            record: Record::from_json(variant.schema(), json)?,
        })
    }

    /// Decodes a partial query and fills every absent field with its
    /// default.
    ///
    /// # Errors
    ///
    /// See [`QueryModel::from_json`].
    pub fn from_partial(variant: QueryVariant, json: &Value) -> Result<Self> {
        Self::from_json(variant, json).map(|query| query.with_defaults())
    }

    /// Returns the query variant.
    #[inline]
    pub fn variant(&self) -> QueryVariant {
        self.variant
    }

    /// Returns the underlying record.
    #[inline]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Returns a copy where absent fields take their defaults.
    ///
    /// Present values win even when falsy (`""`, `0`, `false`), so an
    /// explicitly emptied prefix stays empty. Idempotent.
    pub fn with_defaults(&self) -> Self {
        Self {
            variant: self.variant,
            record: self.record.with_defaults(),
        }
    }

    /// Returns the effective bucket.
    pub fn bucket(&self) -> String {
        self.record.text(BUCKET)
    }

    /// Returns the effective key prefix.
    pub fn prefix(&self) -> String {
        self.record.text(PREFIX)
    }

    /// Returns the effective aggregation metric.
    ///
    /// Variants without a metric field aggregate sizes.
    pub fn metric(&self) -> Metric {
        self.record
            .effective(METRIC)
            .and_then(|value| value.as_choice())
            .map(Metric::from_ordinal)
            .unwrap_or_default()
    }

    /// Returns the query text, if one was entered.
    pub fn query_text(&self) -> Option<&str> {
        self.record.get(QUERY_TEXT).and_then(|value| value.as_text())
    }

    /// Returns the effective constant, possibly `NaN`.
    pub fn constant(&self) -> Option<f64> {
        self.record
            .effective(CONSTANT)
            .and_then(|value| value.as_number())
    }

    /// Returns whether streaming is enabled.
    pub fn with_streaming(&self) -> bool {
        self.record
            .effective(WITH_STREAMING)
            .and_then(|value| value.as_flag())
            .unwrap_or(false)
    }

    /// Returns a snapshot with exactly one field replaced.
    ///
    /// Edits of live fields carry [`ExecuteIntent::RunQuery`], whatever the
    /// value turned out to be.
    ///
    /// [`ExecuteIntent::RunQuery`]: crate::edit::ExecuteIntent::RunQuery
    ///
    /// # Errors
    ///
    /// Fails for fields the variant does not declare and for raw values
    /// that cannot target the field's kind.
    pub fn apply_field_edit(&self, field: &str, value: RawValue) -> Result<EditOutcome<Self>> {
        let spec = self.record.schema().require(field)?;
        let value = value.into_field_value(spec)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            variant = %self.variant,
            field = spec.name,
            live = spec.live,
            "query field edited"
        );

        let snapshot = Self {
            variant: self.variant,
            record: self.record.with_field(spec, value),
        };

        Ok(if spec.live {
            EditOutcome::run(snapshot)
        } else {
            EditOutcome::quiet(snapshot)
        })
    }

    /// Parses `raw` as a number and stores it in a numeric field.
    ///
    /// Unparsable input is stored as `NaN`.
    ///
    /// # Errors
    ///
    /// Fails for undeclared fields and for fields that are not numeric.
    pub fn apply_numeric_field_edit(&self, field: &str, raw: &str) -> Result<EditOutcome<Self>> {
        let spec = self.record.schema().require(field)?;
        if spec.kind != FieldKind::Number {
            return Err(Error::kind_mismatch(field, spec.kind.name(), "number"));
        }
        self.apply_field_edit(field, RawValue::NumericText(raw.to_owned()))
    }

    /// Encodes the query as the host's flat JSON object.
    pub fn to_json(&self) -> Value {
        self.record.to_json()
    }
}

impl Snapshot for QueryModel {
    fn apply(&self, edit: &FieldEdit) -> Result<EditOutcome<Self>> {
        self.apply_field_edit(&edit.field, edit.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;
    use crate::edit::{Editor, ExecuteIntent};
    use crate::value::FieldValue;

    #[test]
    fn test_empty_query_defaults() {
        let query = QueryModel::from_partial(QueryVariant::Streaming, &json!({})).unwrap();
        assert_eq!(query.bucket(), "");
        assert_eq!(query.prefix(), "/");
        assert_eq!(query.metric(), Metric::Size);
        assert_eq!(query.constant(), Some(6.5));
        assert!(!query.with_streaming());
        assert_eq!(query.query_text(), None);
        assert!(!query.record().is_present(QUERY_TEXT));
    }

    #[test]
    fn test_explicit_empty_prefix_survives_defaults() {
        let query =
            QueryModel::from_partial(QueryVariant::Metric, &json!({ "prefix": "" })).unwrap();
        assert_eq!(query.prefix(), "");
        assert_eq!(query.bucket(), "");
    }

    #[test]
    fn test_bucket_and_prefix_edit_scenario() {
        let mut editor = Editor::new(QueryModel::new(QueryVariant::Metric));
        let intent = editor.dispatch(&FieldEdit::text(BUCKET, "logs")).unwrap();
        assert_eq!(intent, None);
        editor.dispatch(&FieldEdit::text(PREFIX, "2024/")).unwrap();

        let query = editor.snapshot().with_defaults();
        assert_eq!(
            query.to_json(),
            json!({ "bucket": "logs", "prefix": "2024/", "metric": 0 })
        );
    }

    #[test]
    fn test_numeric_edit_stores_nan_and_runs() {
        let query = QueryModel::new(QueryVariant::Streaming).with_defaults();
        let outcome = query.apply_numeric_field_edit(CONSTANT, "abc").unwrap();

        assert_eq!(outcome.intent, Some(ExecuteIntent::RunQuery));
        assert!(outcome.snapshot.constant().is_some_and(f64::is_nan));
        assert!(
            outcome
                .snapshot
                .record()
                .get(CONSTANT)
                .is_some_and(FieldValue::is_invalid_number)
        );
        assert_eq!(query.constant(), Some(6.5));
    }

    #[test]
    fn test_numeric_edit_survives_json_roundtrip() {
        let edited = QueryModel::new(QueryVariant::Streaming)
            .apply_numeric_field_edit(CONSTANT, "abc")
            .unwrap()
            .snapshot;

        let stored = edited.to_json();
        assert_eq!(stored, json!({ "constant": "NaN" }));

        let reloaded = QueryModel::from_partial(QueryVariant::Streaming, &stored).unwrap();
        assert!(reloaded.constant().is_some_and(f64::is_nan));
        assert_eq!(reloaded.to_json()[CONSTANT], json!("NaN"));
    }

    #[test]
    fn test_numeric_edit_parses_valid_input() {
        let query = QueryModel::new(QueryVariant::Streaming);
        let outcome = query.apply_numeric_field_edit(CONSTANT, "2.25").unwrap();
        assert_eq!(outcome.snapshot.constant(), Some(2.25));
        assert!(outcome.should_run());
    }

    #[test]
    fn test_streaming_switch_runs_query() {
        let query = QueryModel::new(QueryVariant::Streaming);
        let outcome = query.apply_field_edit(WITH_STREAMING, RawValue::Flag(true)).unwrap();
        assert!(outcome.snapshot.with_streaming());
        assert_eq!(outcome.intent, Some(ExecuteIntent::RunQuery));

        let outcome = query
            .apply_field_edit(QUERY_TEXT, RawValue::Text("select".into()))
            .unwrap();
        assert_eq!(outcome.intent, None);
        assert_eq!(outcome.snapshot.query_text(), Some("select"));
    }

    #[test]
    fn test_metric_edit_fails_open() {
        let query = QueryModel::new(QueryVariant::Metric);
        let outcome = query.apply_field_edit(METRIC, RawValue::Ordinal(Some(1))).unwrap();
        assert_eq!(outcome.snapshot.metric(), Metric::KeyCount);

        let outcome = outcome
            .snapshot
            .apply_field_edit(METRIC, RawValue::Ordinal(Some(3)))
            .unwrap();
        assert_eq!(outcome.snapshot.metric(), Metric::Size);
    }

    #[test]
    fn test_edits_outside_the_variant_are_rejected() {
        let query = QueryModel::new(QueryVariant::Partition);
        let err = query
            .apply_field_edit(CONSTANT, RawValue::NumericText("1".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let err = QueryModel::new(QueryVariant::Streaming)
            .apply_numeric_field_edit(BUCKET, "1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KindMismatch);
        assert_eq!(query.metric(), Metric::Size);
    }

    #[test]
    fn test_passthrough_keys_survive_edits() {
        let query = QueryModel::from_json(
            QueryVariant::Metric,
            &json!({ "refId": "A", "datasource": { "uid": "s3" }, "bucket": "b" }),
        )
        .unwrap();
        let outcome = query
            .apply_field_edit(PREFIX, RawValue::Text("x/".into()))
            .unwrap();

        let json = outcome.snapshot.to_json();
        assert_eq!(json["refId"], json!("A"));
        assert_eq!(json["datasource"], json!({ "uid": "s3" }));
        assert_eq!(json["prefix"], json!("x/"));
    }

    fn partial_streaming_query() -> impl Strategy<Value = Value> {
        (
            proptest::option::of("[a-z0-9-]{0,12}"),
            proptest::option::of("[a-z0-9/=<>-]{0,16}"),
            proptest::option::of(-2_i64..4),
            proptest::option::of("[ -~]{0,8}"),
            proptest::option::of(-1.0e6_f64..1.0e6),
            proptest::option::of(any::<bool>()),
        )
            .prop_map(|(bucket, prefix, metric, text, constant, streaming)| {
                let mut object = serde_json::Map::new();
                let mut put = |key: &str, value: Option<Value>| {
                    if let Some(value) = value {
                        object.insert(key.to_owned(), value);
                    }
                };
                put(BUCKET, bucket.map(Value::from));
                put(PREFIX, prefix.map(Value::from));
                put(METRIC, metric.map(Value::from));
                put(QUERY_TEXT, text.map(Value::from));
                put(CONSTANT, constant.map(Value::from));
                put(WITH_STREAMING, streaming.map(Value::from));
                Value::Object(object)
            })
    }

    const TEXT_FIELDS: &[&str] = &[BUCKET, PREFIX, QUERY_TEXT];

    proptest! {
        #[test]
        fn test_with_defaults_is_idempotent(json in partial_streaming_query()) {
            let query = QueryModel::from_json(QueryVariant::Streaming, &json).unwrap();
            let once = query.with_defaults();
            prop_assert_eq!(once.with_defaults(), once.clone());

            let encoded = once.to_json();
            for (name, value) in json.as_object().into_iter().flatten() {
                if name != METRIC {
                    prop_assert_eq!(&encoded[name.as_str()], value);
                }
            }
        }

        #[test]
        fn test_single_field_edit_changes_only_that_field(
            json in partial_streaming_query(),
            field in proptest::sample::select(TEXT_FIELDS),
            text in "[a-z]{0,10}",
        ) {
            let query = QueryModel::from_json(QueryVariant::Streaming, &json).unwrap();
            let outcome = query
                .apply_field_edit(field, RawValue::Text(text.clone()))
                .unwrap();

            let before = query.to_json();
            let after = outcome.snapshot.to_json();
            prop_assert_eq!(&after[field], &Value::from(text));
            for (name, value) in before.as_object().into_iter().flatten() {
                if name != field {
                    prop_assert_eq!(&after[name.as_str()], value);
                }
            }
            prop_assert_eq!(
                after.as_object().map(|o| o.len()),
                before.as_object().map(|o| o.len() + usize::from(!query.record().is_present(field)))
            );
            prop_assert_eq!(outcome.intent, None);
        }
    }
}
