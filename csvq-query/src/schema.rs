use arrow::datatypes::DataType;
use csvq_csv::Table;
use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

/// Column type names reported to callers.
///
/// The vocabulary is closed and independent of the engine's own type names; loaded tables
/// only ever hold these five types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int64,
    Float64,
    String,
    Bool,
    Null,
}

impl ColumnType {
    /// Map an Arrow type onto the vocabulary.
    ///
    /// Anything outside the loader's closed set reports as `String`, the type the loader
    /// would have stored it as.
    pub fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int64 => ColumnType::Int64,
            DataType::Float64 => ColumnType::Float64,
            DataType::Boolean => ColumnType::Bool,
            DataType::Null => ColumnType::Null,
            _ => ColumnType::String,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::String => "string",
            ColumnType::Bool => "bool",
            ColumnType::Null => "null",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Shape and column types of a loaded table.
///
/// Serializes as `{"shape": [rows, columns], "dtypes": {name: type, ...}}` with `dtypes` in
/// table column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub row_count: usize,
    pub column_count: usize,
    pub column_types: Vec<(String, ColumnType)>,
}

impl TableDescription {
    pub fn shape(&self) -> [usize; 2] {
        [self.row_count, self.column_count]
    }
}

struct OrderedTypes<'a>(&'a [(String, ColumnType)]);

impl Serialize for OrderedTypes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, column_type) in self.0 {
            map.serialize_entry(name, column_type)?;
        }
        map.end()
    }
}

impl Serialize for TableDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TableDescription", 2)?;
        state.serialize_field("shape", &self.shape())?;
        state.serialize_field("dtypes", &OrderedTypes(&self.column_types))?;
        state.end()
    }
}

pub fn describe(table: &Table) -> TableDescription {
    let schema = table.schema();
    let column_types = schema
        .fields()
        .iter()
        .map(|field| (field.name().clone(), ColumnType::from_arrow(field.data_type())))
        .collect();

    TableDescription {
        row_count: table.num_rows(),
        column_count: table.num_columns(),
        column_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;

    fn sample_table() -> Table {
        let schema = Arc::new(Schema::new(vec![
            Field::new("z", DataType::Utf8, true),
            Field::new("a", DataType::Int64, true),
            Field::new("m", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(StringArray::from(vec![Some("x"), None, Some("z")])),
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
            ],
        )
        .expect("batch");
        Table::new(schema, vec![batch.clone(), batch])
    }

    #[test]
    fn describe_reports_shape_and_ordered_types() {
        let description = describe(&sample_table());
        assert_eq!(description.shape(), [6, 3]);
        assert_eq!(
            description.column_types,
            vec![
                ("z".to_string(), ColumnType::String),
                ("a".to_string(), ColumnType::Int64),
                ("m".to_string(), ColumnType::Float64),
            ]
        );
    }

    #[test]
    fn serialized_dtypes_keep_column_order() {
        let description = describe(&sample_table());
        let text = serde_json::to_string(&description).expect("serialize");
        assert_eq!(
            text,
            r#"{"shape":[6,3],"dtypes":{"z":"string","a":"int64","m":"float64"}}"#
        );
    }

    #[test]
    fn unknown_arrow_types_report_as_string() {
        assert_eq!(ColumnType::from_arrow(&DataType::Date32), ColumnType::String);
        assert_eq!(ColumnType::from_arrow(&DataType::Boolean).as_str(), "bool");
    }
}
