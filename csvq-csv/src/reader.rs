use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, new_null_array};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::csv::reader::ReaderBuilder;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use csvq_result::Result;

use crate::inference::{self, map_arrow_error, open_source};
use crate::{CsvReadOptions, Table};

#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    options: CsvReadOptions,
}

impl CsvReader {
    pub fn new(options: CsvReadOptions) -> Self {
        Self { options }
    }

    pub fn infer_schema(&self, path: &Path) -> Result<SchemaRef> {
        let outcome = inference::infer(path, &self.options)?;
        Ok(outcome.target_schema)
    }

    /// Read the whole file into a [`Table`] typed by the sampled schema.
    pub fn load(&self, path: &Path) -> Result<Table> {
        let outcome = inference::infer(path, &self.options)?;
        let file = open_source(path)?;

        let mut builder = ReaderBuilder::new(Arc::clone(&outcome.raw_schema))
            .with_format(self.options.to_format()?);
        if let Some(batch_size) = self.options.batch_size {
            builder = builder.with_batch_size(batch_size);
        }
        let reader = builder
            .build(file)
            .map_err(|err| map_arrow_error(path, err))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|err| map_arrow_error(path, err))?;
            if batch.num_rows() == 0 {
                continue;
            }
            let typed = cast_batch(&batch, &outcome.target_schema)
                .map_err(|err| map_arrow_error(path, err))?;
            batches.push(typed);
        }

        let table = Table::new(outcome.target_schema, batches);
        tracing::debug!(
            path = %path.display(),
            rows = table.num_rows(),
            columns = table.num_columns(),
            "loaded csv table"
        );
        Ok(table)
    }
}

pub fn load_table(path: &Path, options: &CsvReadOptions) -> Result<Table> {
    CsvReader::new(options.clone()).load(path)
}

/// Cast raw text columns to the target types; unparsable values become null.
fn cast_batch(batch: &RecordBatch, target: &SchemaRef) -> std::result::Result<RecordBatch, ArrowError> {
    let options = CastOptions {
        safe: true,
        ..Default::default()
    };

    let columns = batch
        .columns()
        .iter()
        .zip(target.fields())
        .map(|(column, field)| match field.data_type() {
            DataType::Null => Ok(new_null_array(&DataType::Null, column.len())),
            data_type if data_type == column.data_type() => Ok(Arc::clone(column)),
            data_type => cast_with_options(column, data_type, &options),
        })
        .collect::<std::result::Result<Vec<ArrayRef>, ArrowError>>()?;

    RecordBatch::try_new(Arc::clone(target), columns)
}
