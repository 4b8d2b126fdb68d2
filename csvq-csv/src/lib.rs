//! Delimited text loading for csvq.
//!
//! A file is turned into a [`Table`] in two passes. The first pass samples at most
//! [`CsvReadOptions::max_read_records`] data rows and infers one type per column from the
//! closed set {Int64, Float64, Boolean, Utf8, Null}. The second pass reads every row as text
//! and casts each column to its inferred type; values past the sample window that do not fit
//! the inferred type become null rather than failing the load.
//!
//! Nothing is cached: every call to [`load_table`] (or [`CsvReader::load`]) reads the file
//! from scratch.

use arrow::csv::reader::Format;
use csvq_result::{Error, Result};
use regex::Regex;

mod inference;
pub mod reader;
pub mod table;

pub use reader::{CsvReader, load_table};
pub use table::Table;

/// Number of data rows sampled for type inference unless overridden.
///
/// The value is part of the observable contract: the same file always yields the same column
/// types for the same sample length.
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    pub has_header: bool,
    pub delimiter: u8,
    /// Rows sampled for inference; `None` samples the whole file.
    pub max_read_records: Option<usize>,
    pub batch_size: Option<usize>,
    /// Extra token (matched case-insensitively) treated as null alongside empty fields.
    pub null_token: Option<String>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            max_read_records: Some(DEFAULT_INFER_SCHEMA_LENGTH),
            batch_size: None,
            null_token: None,
        }
    }
}

impl CsvReadOptions {
    pub(crate) fn to_format(&self) -> Result<Format> {
        let mut format = Format::default().with_header(self.has_header);
        if self.delimiter != b',' {
            format = format.with_delimiter(self.delimiter);
        }
        if let Some(token) = &self.null_token {
            format = format.with_null_regex(null_token_regex(token)?);
        }
        Ok(format)
    }
}

fn null_token_regex(token: &str) -> Result<Regex> {
    // A custom null regex replaces arrow's empty-field check, so keep empty fields null too.
    let pattern = format!("(?i)^(?:|{})$", regex::escape(token));
    Regex::new(&pattern).map_err(|err| {
        Error::SourceMalformed(format!("invalid null token '{token}': {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_token_regex_matches_token_and_empty() {
        let re = null_token_regex("N/A").expect("regex");
        assert!(re.is_match(""));
        assert!(re.is_match("n/a"));
        assert!(re.is_match("N/A"));
        assert!(!re.is_match("N/AB"));
        assert!(!re.is_match("x"));
    }

    #[test]
    fn default_options_sample_ten_thousand_rows() {
        let options = CsvReadOptions::default();
        assert!(options.has_header);
        assert_eq!(options.delimiter, b',');
        assert_eq!(options.max_read_records, Some(DEFAULT_INFER_SCHEMA_LENGTH));
    }
}
