//! # Rowbound - declarative row mapping for SQLite
//!
//! Describe a plain struct once, get schema and CRUD for free.
//!
//! Rowbound provides:
//! - Static field-descriptor tables for mapped types (no runtime reflection)
//! - `CREATE TABLE IF NOT EXISTS` generation from those descriptors
//! - Parameterized insert/upsert/update/delete/select statements
//! - Row materialization back into typed instances, or raw column maps
//! - A pooled, thread-safe SQLite facade tying it all together

pub mod value;
pub mod entity;
pub mod storage;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use value::{FieldValue, SemanticType, Value};
pub use entity::{Entity, FieldDescriptor, Shape, SqlType, TableMeta};
pub use storage::{ConnectionPool, PoolConfig, PreparedOperation, RawRow, SqliteDao};

/// Result type alias for Rowbound operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Rowbound operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller passed a null, mismatched or unsupported argument
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate or missing column metadata
    #[error("Schema error: {0}")]
    Schema(String),

    /// A row could not populate the target type
    #[error("Materialization error: {0}")]
    Materialization(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Backend error: {0}")]
    Backend(String),

    /// Connection acquisition timed out
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Error for a field name a mapped type does not know
    pub fn unknown_field<T: ?Sized>(field: &str) -> Self {
        Error::Materialization(format!(
            "{} has no field '{}'",
            entity::simple_type_name::<T>(),
            field
        ))
    }
}

// Extended result codes for constraint failures that mean "key already taken"
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        failure.extended_code,
                        SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE
                    ) =>
            {
                Error::DuplicateKey(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(index, _, cause) => {
                Error::Materialization(format!("column {}: {}", index, cause))
            }
            _ => Error::Backend(err.to_string()),
        }
    }
}
