//! Connection source - a bounded r2d2 pool of SQLite connections
//!
//! Each facade operation acquires exactly one connection and gives it back
//! when the guard drops, on every exit path.

use crate::{Error, Result};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A connection checked out of the pool; returned on drop
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing and timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrent connections
    pub max_size: u32,
    /// How long `acquire` waits before giving up
    pub connection_timeout_ms: u64,
    /// Idle connections are closed after this long (`None` keeps them)
    pub idle_timeout_ms: Option<u64>,
    /// Connections are recycled after this long (`None` keeps them)
    pub max_lifetime_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout_ms: 30_000,
            idle_timeout_ms: Some(600_000),
            max_lifetime_ms: Some(1_800_000),
        }
    }
}

/// Shared handle to the connection pool. Cloning is cheap.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: r2d2::Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Open a pool over a database file (creates it if missing)
    pub fn open(path: &Path, config: &PoolConfig) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        Self::build(manager, config)
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(&PoolConfig::default())
    }

    /// In-memory database behind a single connection that never expires.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// capped at one connection; only `connection_timeout_ms` is honored.
    pub fn open_in_memory_with(config: &PoolConfig) -> Result<Self> {
        let single = PoolConfig {
            max_size: 1,
            connection_timeout_ms: config.connection_timeout_ms,
            idle_timeout_ms: None,
            max_lifetime_ms: None,
        };
        Self::build(SqliteConnectionManager::memory(), &single)
    }

    fn build(manager: SqliteConnectionManager, config: &PoolConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(Error::Connection("pool max_size must be at least 1".to_string()));
        }
        let inner = r2d2::Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .idle_timeout(config.idle_timeout_ms.map(Duration::from_millis))
            .max_lifetime(config.max_lifetime_ms.map(Duration::from_millis))
            .build(manager)
            .map_err(|e| Error::Connection(e.to_string()))?;
        tracing::debug!(max_size = config.max_size, "connection pool ready");
        Ok(Self { inner })
    }

    /// Check out a connection, waiting up to the configured timeout
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.inner
            .get()
            .map_err(|e| Error::PoolExhausted(e.to_string()))
    }

    /// Connections currently open / idle
    pub fn state(&self) -> (u32, u32) {
        let state = self.inner.state();
        (state.connections, state.idle_connections)
    }

    pub fn max_size(&self) -> u32 {
        self.inner.max_size()
    }
}
