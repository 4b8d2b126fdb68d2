//! csvq: read-only SQL over CSV files
//!
//! This crate is the entrypoint for the csvq toolkit. It wires the loader (`csvq-csv`) and the
//! query layer (`csvq-query`) behind a [`Gateway`] and exposes it over two transports: a
//! line-delimited JSON-RPC tool server on stdio and an HTTP server.
//!
//! # Quick Start
//!
//! ```no_run
//! use csvq::{AccessPolicy, Gateway, GatewayConfig};
//!
//! # async fn demo() -> csvq::Result<()> {
//! let gateway = Gateway::new(GatewayConfig::new(AccessPolicy::Unrestricted));
//! let description = gateway.describe("/data/t.csv").await?;
//! let count = gateway.execute_one("/data/t.csv", "SELECT COUNT(*) FROM self").await?;
//! # let _ = (description, count);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Errors** (`csvq-result`): the closed set of failure categories.
//! - **Loading** (`csvq-csv`): schema inference and typed loading of one file.
//! - **Querying** (`csvq-query`): SQL execution, description and result normalization.
//! - **Gateway** ([`gateway`], [`policy`]): path policy and the three operations.
//! - **Transports** ([`rpc`], [`stdio`], [`http`]) and process [`config`].

pub mod config;
pub mod gateway;
pub mod http;
pub mod policy;
pub mod rpc;
pub mod stdio;
pub mod tools;

pub use gateway::{Gateway, GatewayConfig};
pub use policy::{AccessPolicy, ResolvedPath, resolve};
pub use rpc::Dispatcher;

pub use csvq_csv::{CsvReadOptions, DEFAULT_INFER_SCHEMA_LENGTH};
pub use csvq_query::{ColumnType, NormalizedPayload, Scalar, TableDescription};
pub use csvq_result::{Error, ErrorKind, Result};
