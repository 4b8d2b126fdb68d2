//! Bounded-sample schema inference.
//!
//! Arrow's CSV format inference runs over at most `max_read_records` data rows. Its answer is
//! narrowed to the closed set of column types csvq exposes, and header names are made unique
//! so the table can be registered with a query engine. The outcome carries two schemas: the
//! target schema with inferred types, and a raw all-text schema used to read the full file
//! before casting.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use csvq_result::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::CsvReadOptions;

pub(crate) struct InferenceOutcome {
    pub target_schema: SchemaRef,
    pub raw_schema: SchemaRef,
}

pub(crate) fn infer(path: &Path, options: &CsvReadOptions) -> Result<InferenceOutcome> {
    let file = open_source(path)?;
    let format = options.to_format()?;
    let (sampled, records) = format
        .infer_schema(file, options.max_read_records)
        .map_err(|err| map_arrow_error(path, err))?;

    if sampled.fields().is_empty() {
        return Err(Error::SourceMalformed(format!(
            "{}: no header row",
            path.display()
        )));
    }

    let names = unique_column_names(sampled.fields().iter().map(|f| f.name().as_str()));

    let mut target_fields = Vec::with_capacity(names.len());
    let mut raw_fields = Vec::with_capacity(names.len());
    for (field, name) in sampled.fields().iter().zip(names) {
        target_fields.push(Field::new(&name, narrow_type(field.data_type()), true));
        raw_fields.push(Field::new(name, DataType::Utf8, true));
    }

    tracing::debug!(
        path = %path.display(),
        columns = target_fields.len(),
        sampled_rows = records,
        "inferred csv schema"
    );

    Ok(InferenceOutcome {
        target_schema: Arc::new(Schema::new(target_fields)),
        raw_schema: Arc::new(Schema::new(raw_fields)),
    })
}

/// Collapse arrow's inferred type onto the types a loaded table may hold.
///
/// Temporal columns stay text: dates and timestamps are only parsed when a query casts them.
pub(crate) fn narrow_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Int64 => DataType::Int64,
        DataType::Float64 => DataType::Float64,
        DataType::Boolean => DataType::Boolean,
        DataType::Null => DataType::Null,
        _ => DataType::Utf8,
    }
}

/// Empty names become `column_<n>` (1-based); repeats get `_duplicated_<k>` suffixes.
pub(crate) fn unique_column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut next_suffix: FxHashMap<String, usize> = FxHashMap::default();
    let mut out = Vec::new();

    for (idx, name) in names.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        while seen.contains(&candidate) {
            let suffix = next_suffix.entry(base.clone()).or_insert(0);
            candidate = format!("{base}_duplicated_{suffix}");
            *suffix += 1;
        }

        seen.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

pub(crate) fn open_source(path: &Path) -> Result<File> {
    let metadata = std::fs::metadata(path)
        .map_err(|err| Error::SourceUnreadable(format!("{}: {err}", path.display())))?;
    if metadata.is_dir() {
        return Err(Error::SourceUnreadable(format!(
            "{}: is a directory",
            path.display()
        )));
    }
    File::open(path).map_err(|err| Error::SourceUnreadable(format!("{}: {err}", path.display())))
}

pub(crate) fn map_arrow_error(path: &Path, err: ArrowError) -> Error {
    match err {
        ArrowError::IoError(msg, _) => {
            Error::SourceUnreadable(format!("{}: {msg}", path.display()))
        }
        other => Error::SourceMalformed(format!("{}: {other}", path.display())),
    }
}
