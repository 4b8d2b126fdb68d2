//! Error types and result definitions for csvq.
//!
//! Every crate in the workspace reports failures through the single [`Error`] enum and the
//! [`Result<T>`] alias. The enum is deliberately small: callers of the gateway only ever see
//! one of five kinds, and lower-level faults (I/O, Arrow, DataFusion) are folded into the
//! nearest kind at the component boundary where they occur.
//!
//! # Error Categories
//!
//! - **Access policy** ([`Error::PolicyViolation`]): a file reference the active policy refuses
//! - **Source access** ([`Error::SourceUnreadable`]): the file cannot be opened or read
//! - **Source format** ([`Error::SourceMalformed`]): the file is not valid delimited text
//! - **Query text** ([`Error::QuerySyntaxError`], [`Error::QuerySemanticError`]): the SQL is
//!   unparsable, or parses but cannot be planned or executed against the table
//!
//! Each variant maps to a stable [`ErrorKind`] whose [`ErrorKind::code`] is what transports
//! report to remote callers.

pub mod error;
pub mod result;

pub use error::{Error, ErrorKind};
pub use result::Result;
