use crate::error::Error;

/// Result type alias used throughout csvq.
///
/// Shorthand for `std::result::Result<T, Error>`; every fallible gateway, loader and query
/// operation returns this type.
pub type Result<T> = std::result::Result<T, Error>;
