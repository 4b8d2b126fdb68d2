//! Query layer over loaded csvq tables.
//!
//! Three pieces sit on top of a [`csvq_csv::Table`]:
//!
//! - [`describe`]: shape and per-column type names from a closed vocabulary.
//! - [`QueryExecutor`]: runs one SQL string against the table, bound as `self`, through
//!   DataFusion and classifies the answer as a [`QueryResult`].
//! - [`normalize`]: turns a [`QueryResult`] into a [`NormalizedPayload`] built only from
//!   primitives, ready for any serde transport.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> csvq_result::Result<()> {
//! use std::path::Path;
//! use csvq_csv::{CsvReadOptions, load_table};
//! use csvq_query::{QueryExecutor, QuerySpec, normalize};
//!
//! let table = load_table(Path::new("/data/t.csv"), &CsvReadOptions::default())?;
//! let result = QueryExecutor::default()
//!     .execute(&table, &QuerySpec::new("SELECT COUNT(*) FROM self"))
//!     .await?;
//! let payload = normalize(result)?;
//! # let _ = payload;
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod normalize;
pub mod schema;

pub use executor::{QueryExecutor, QueryResult, QuerySpec, SELF_TABLE};
pub use normalize::{NormalizedPayload, Scalar, normalize};
pub use schema::{ColumnType, TableDescription, describe};
