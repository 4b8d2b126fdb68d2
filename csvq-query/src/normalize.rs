//! Conversion of typed query results into primitive trees.
//!
//! Coercion is lossy but deterministic:
//!
//! | Arrow type | [`Scalar`] |
//! |---|---|
//! | Int8..Int64, UInt8..UInt32 | `Int` |
//! | UInt64 | `Int` when it fits in `i64`, else `Float` |
//! | Float16..Float64, Decimal128/256 | `Float` |
//! | Boolean | `Bool` |
//! | Utf8, LargeUtf8, Utf8View, string dictionaries | `String` |
//! | Null | `Null` |
//! | anything else (temporal, binary, nested) | `String`, rendered by Arrow's display formatter |

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use csvq_result::{Error, Result};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::executor::QueryResult;

/// A transportable primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Transport-neutral shape of one query result.
///
/// Serializes as a JSON-style object of column arrays, a flat array, or a bare primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedPayload {
    /// Column name to values, in result column order.
    Table(Vec<(String, Vec<Scalar>)>),
    Column(Vec<Scalar>),
    Scalar(Scalar),
}

impl Serialize for NormalizedPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NormalizedPayload::Table(columns) => {
                let mut map = serializer.serialize_map(Some(columns.len()))?;
                for (name, values) in columns {
                    map.serialize_entry(name, values)?;
                }
                map.end()
            }
            NormalizedPayload::Column(values) => values.serialize(serializer),
            NormalizedPayload::Scalar(value) => value.serialize(serializer),
        }
    }
}

pub fn normalize(result: QueryResult) -> Result<NormalizedPayload> {
    match result {
        QueryResult::Table { schema, batches } => {
            let mut columns: Vec<(String, Vec<Scalar>)> = schema
                .fields()
                .iter()
                .map(|field| (field.name().clone(), Vec::new()))
                .collect();
            for batch in &batches {
                for (slot, column) in columns.iter_mut().zip(batch.columns()) {
                    slot.1.extend(array_to_scalars(column)?);
                }
            }
            Ok(NormalizedPayload::Table(columns))
        }
        QueryResult::Column { values, .. } => {
            Ok(NormalizedPayload::Column(array_to_scalars(&values)?))
        }
        QueryResult::Scalar { value, .. } => {
            let array = value.to_array_of_size(1).map_err(Error::query_semantic)?;
            let scalar = array_to_scalars(&array)?
                .into_iter()
                .next()
                .unwrap_or(Scalar::Null);
            Ok(NormalizedPayload::Scalar(scalar))
        }
    }
}

fn array_to_scalars(array: &ArrayRef) -> Result<Vec<Scalar>> {
    match array.data_type() {
        DataType::Null => Ok(vec![Scalar::Null; array.len()]),
        DataType::Boolean => Ok(array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Scalar::Null, Scalar::Bool))
            .collect()),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let ints = cast(array, &DataType::Int64).map_err(Error::query_semantic)?;
            Ok(ints
                .as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(Scalar::Null, Scalar::Int))
                .collect())
        }
        DataType::UInt64 => Ok(array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| match v {
                Some(v) => i64::try_from(v).map_or(Scalar::Float(v as f64), Scalar::Int),
                None => Scalar::Null,
            })
            .collect()),
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(..)
        | DataType::Decimal256(..) => {
            let floats = cast(array, &DataType::Float64).map_err(Error::query_semantic)?;
            Ok(floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(Scalar::Null, Scalar::Float))
                .collect())
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => strings(array),
        DataType::Dictionary(_, value) if is_string_type(value) => strings(array),
        _ => formatted(array),
    }
}

fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

fn strings(array: &ArrayRef) -> Result<Vec<Scalar>> {
    let text = cast(array, &DataType::Utf8).map_err(Error::query_semantic)?;
    Ok(text
        .as_string::<i32>()
        .iter()
        .map(|v| v.map_or(Scalar::Null, |s| Scalar::String(s.to_string())))
        .collect())
}

fn formatted(array: &ArrayRef) -> Result<Vec<Scalar>> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array.as_ref(), &options).map_err(Error::query_semantic)?;
    let nulls = array.logical_nulls();
    Ok((0..array.len())
        .map(|idx| {
            if nulls.as_ref().is_some_and(|n| n.is_null(idx)) {
                Scalar::Null
            } else {
                Scalar::String(formatter.value(idx).to_string())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{
        Date32Array, Decimal128Array, Int32Array, StringArray, TimestampSecondArray, UInt64Array,
    };
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use datafusion::common::ScalarValue;
    use serde_json::json;

    fn column(values: ArrayRef) -> QueryResult {
        QueryResult::Column {
            name: "c".into(),
            values,
        }
    }

    #[test]
    fn table_is_column_oriented_and_ordered() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("b", DataType::Utf8, true),
            Field::new("a", DataType::Int32, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(StringArray::from(vec![Some("x"), None])),
                Arc::new(Int32Array::from(vec![1, 2])),
            ],
        )
        .expect("batch");
        let payload = normalize(QueryResult::Table {
            schema,
            batches: vec![batch.clone(), batch],
        })
        .expect("normalize");

        let text = serde_json::to_string(&payload).expect("serialize");
        assert_eq!(text, r#"{"b":["x",null,"x",null],"a":[1,2,1,2]}"#);
    }

    #[test]
    fn scalar_is_unwrapped() {
        let payload = normalize(QueryResult::Scalar {
            name: "count(*)".into(),
            value: ScalarValue::Int64(Some(2)),
        })
        .expect("normalize");
        assert_eq!(payload, NormalizedPayload::Scalar(Scalar::Int(2)));
        assert_eq!(serde_json::to_value(&payload).expect("json"), json!(2));
    }

    #[test]
    fn null_scalar_is_null() {
        let payload = normalize(QueryResult::Scalar {
            name: "max".into(),
            value: ScalarValue::Int64(None),
        })
        .expect("normalize");
        assert_eq!(serde_json::to_value(&payload).expect("json"), json!(null));
    }

    #[test]
    fn unsigned_overflow_becomes_float() {
        let payload = normalize(column(Arc::new(UInt64Array::from(vec![7, u64::MAX]))))
            .expect("normalize");
        assert_eq!(
            payload,
            NormalizedPayload::Column(vec![Scalar::Int(7), Scalar::Float(u64::MAX as f64)])
        );
    }

    #[test]
    fn decimals_become_floats() {
        let decimals = Decimal128Array::from(vec![Some(1250), None])
            .with_precision_and_scale(10, 2)
            .expect("decimal");
        let payload = normalize(column(Arc::new(decimals))).expect("normalize");
        assert_eq!(
            payload,
            NormalizedPayload::Column(vec![Scalar::Float(12.5), Scalar::Null])
        );
    }

    #[test]
    fn temporal_values_are_rendered_as_strings() {
        let dates = normalize(column(Arc::new(Date32Array::from(vec![Some(19723), None]))))
            .expect("normalize");
        assert_eq!(
            dates,
            NormalizedPayload::Column(vec![Scalar::String("2024-01-01".into()), Scalar::Null])
        );

        let stamps = normalize(column(Arc::new(TimestampSecondArray::from(vec![0]))))
            .expect("normalize");
        assert_eq!(
            stamps,
            NormalizedPayload::Column(vec![Scalar::String("1970-01-01T00:00:00".into())])
        );
    }
}
