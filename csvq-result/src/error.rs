use std::fmt;

use thiserror::Error;

/// Unified error type for all csvq operations.
///
/// There is no "internal" variant: anything that goes wrong below a component boundary is
/// wrapped into the closest of these five kinds before it crosses that boundary. Messages
/// carry the underlying cause verbatim so remote callers can act on them.
///
/// # Thread Safety
///
/// `Error` is `Send + Sync` so it can cross the blocking-pool boundary used by the loader and
/// be returned from request handlers running on any runtime worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The file reference is not acceptable under the active access policy.
    ///
    /// Raised by the path resolver when:
    /// - a relative reference is supplied while the policy is unrestricted
    /// - a relative reference would escape the scoped root through `..` segments
    /// - the reference is empty
    ///
    /// This is a caller input error; retrying with a different reference may succeed.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// The resolved file could not be opened or read.
    ///
    /// Wraps filesystem failures such as a missing file, a permission error or a directory
    /// where a file was expected.
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),

    /// The file was readable but is not valid delimited text.
    ///
    /// Typical causes are an empty file with no header, rows whose field count differs from
    /// the header, and invalid UTF-8.
    #[error("source malformed: {0}")]
    SourceMalformed(String),

    /// The query text could not be parsed.
    #[error("query syntax error: {0}")]
    QuerySyntaxError(String),

    /// The query parsed but could not be planned or executed.
    ///
    /// Covers unknown columns or functions, type mismatches and statements that are not
    /// allowed against the read-only `self` table. The engine's message is passed through
    /// without further decomposition.
    #[error("query semantic error: {0}")]
    QuerySemanticError(String),
}

/// Discriminant of [`Error`] without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PolicyViolation,
    SourceUnreadable,
    SourceMalformed,
    QuerySyntaxError,
    QuerySemanticError,
}

impl ErrorKind {
    /// Stable, machine-readable code in SCREAMING_SNAKE_CASE.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::PolicyViolation => "POLICY_VIOLATION",
            ErrorKind::SourceUnreadable => "SOURCE_UNREADABLE",
            ErrorKind::SourceMalformed => "SOURCE_MALFORMED",
            ErrorKind::QuerySyntaxError => "QUERY_SYNTAX_ERROR",
            ErrorKind::QuerySemanticError => "QUERY_SEMANTIC_ERROR",
        }
    }

    /// True when the failure was caused by the query text rather than the file.
    pub fn is_query_error(self) -> bool {
        matches!(
            self,
            ErrorKind::QuerySyntaxError | ErrorKind::QuerySemanticError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PolicyViolation(_) => ErrorKind::PolicyViolation,
            Error::SourceUnreadable(_) => ErrorKind::SourceUnreadable,
            Error::SourceMalformed(_) => ErrorKind::SourceMalformed,
            Error::QuerySyntaxError(_) => ErrorKind::QuerySyntaxError,
            Error::QuerySemanticError(_) => ErrorKind::QuerySemanticError,
        }
    }

    /// The message without the kind prefix that `Display` adds.
    pub fn message(&self) -> &str {
        match self {
            Error::PolicyViolation(msg)
            | Error::SourceUnreadable(msg)
            | Error::SourceMalformed(msg)
            | Error::QuerySyntaxError(msg)
            | Error::QuerySemanticError(msg) => msg,
        }
    }

    /// Create a source-unreadable error from any displayable error.
    ///
    /// # Examples
    ///
    /// ```
    /// use csvq_result::{Error, ErrorKind};
    ///
    /// let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    /// let err = Error::source_unreadable(io_err);
    /// assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
    /// assert_eq!(err.message(), "no such file");
    /// ```
    #[inline]
    pub fn source_unreadable<E: fmt::Display>(err: E) -> Self {
        Error::SourceUnreadable(err.to_string())
    }

    /// Create a source-malformed error from any displayable error.
    #[inline]
    pub fn source_malformed<E: fmt::Display>(err: E) -> Self {
        Error::SourceMalformed(err.to_string())
    }

    /// Create a query-semantic error from any displayable error.
    #[inline]
    pub fn query_semantic<E: fmt::Display>(err: E) -> Self {
        Error::QuerySemanticError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_kind() {
        let err = Error::PolicyViolation("relative reference 'a.csv' not permitted".into());
        assert_eq!(
            err.to_string(),
            "policy violation: relative reference 'a.csv' not permitted"
        );
        assert_eq!(err.message(), "relative reference 'a.csv' not permitted");
    }

    #[test]
    fn codes_are_stable() {
        let cases = [
            (Error::PolicyViolation(String::new()), "POLICY_VIOLATION"),
            (Error::SourceUnreadable(String::new()), "SOURCE_UNREADABLE"),
            (Error::SourceMalformed(String::new()), "SOURCE_MALFORMED"),
            (Error::QuerySyntaxError(String::new()), "QUERY_SYNTAX_ERROR"),
            (Error::QuerySemanticError(String::new()), "QUERY_SEMANTIC_ERROR"),
        ];
        for (err, code) in cases {
            assert_eq!(err.kind().code(), code);
            assert_eq!(err.kind().to_string(), code);
        }
    }

    #[test]
    fn query_kinds_are_flagged() {
        assert!(ErrorKind::QuerySyntaxError.is_query_error());
        assert!(ErrorKind::QuerySemanticError.is_query_error());
        assert!(!ErrorKind::SourceMalformed.is_query_error());
    }
}
