//! Storage Layer - SQLite-backed persistence for mapped types
//!
//! Pipeline per operation:
//! - schema: entity metadata → `CREATE TABLE IF NOT EXISTS`
//! - statement: entity metadata + operation → SQL text and ordered parameters
//! - pool: one pooled connection acquired per operation, released on drop
//! - materialize: result rows → typed instances or raw column maps
//! - sqlite: the `SqliteDao` facade orchestrating the above

pub mod schema;
pub mod statement;
pub mod materialize;
pub mod pool;
pub mod sqlite;

pub use materialize::RawRow;
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use statement::PreparedOperation;
pub use sqlite::SqliteDao;
