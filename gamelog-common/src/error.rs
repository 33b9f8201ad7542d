//! Common error types for gamelog

use thiserror::Error;

/// Common result type for gamelog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across gamelog crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mandatory canonical column could not be resolved from the sheet headers
    #[error("Schema error: {0}")]
    Schema(String),

    /// Workbook could not be parsed or serialized
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
