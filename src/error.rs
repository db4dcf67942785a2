//! Error types for LettyDB
//!
//! This module defines all error types used throughout the database engine.

use thiserror::Error;

/// The main error type for LettyDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Parse error: unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Catalog error: name '{0}' exceeds the maximum length")]
    NameTooLong(String),

    // ========== Storage Errors ==========
    #[error("Storage error: database file is not open")]
    FileNotOpen,

    #[error("Storage error: seek to page {0} failed")]
    SeekError(i32),

    #[error("Storage error: write to page {0} failed")]
    WriteError(i32),

    #[error("Storage error: read of page {0} failed")]
    ReadError(i32),

    #[error("Storage error: invalid page {0}")]
    InvalidPage(i32),

    #[error("Storage error: corrupt database ({0})")]
    CorruptDatabase(String),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for LettyDB operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "Catalog error: table 'users' not found");

        let err = Error::UnexpectedToken {
            expected: "FROM".to_string(),
            found: "WHERE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Parse error: unexpected token 'WHERE', expected FROM"
        );
    }
}
