//! Connection pool for libSQL database connections.
//!
//! libSQL's `Database` is already a connection factory; this pool adds a
//! concurrency limit via semaphore plus basic checkout statistics, the way
//! the wider pack's Turso storage backend does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use knowledge_core::Error;
use libsql::{Connection, Database};
use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of concurrent connections.
    pub max_connections: usize,
    /// Maximum time to wait for a connection.
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// Checkout statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct PoolStatistics {
    /// Total connections created.
    pub total_created: usize,
    /// Current number of checked-out connections.
    pub active_connections: usize,
    /// Number of checkouts, ever.
    pub total_checkouts: usize,
}

/// A guard that releases its semaphore permit and decrements the active
/// count when dropped.
pub struct PooledConnection {
    connection: Option<Connection>,
    _permit: OwnedSemaphorePermit,
    stats: Arc<RwLock<PoolStatistics>>,
}

impl PooledConnection {
    /// Borrow the underlying connection.
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Take ownership of the connection, consuming the guard.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] if the connection was
    /// already taken.
    pub fn into_inner(mut self) -> knowledge_core::Result<Connection> {
        self.connection
            .take()
            .ok_or_else(|| Error::DatabaseError("connection already taken".to_string()))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let mut stats = self.stats.write();
        stats.active_connections = stats.active_connections.saturating_sub(1);
    }
}

/// Bounded-concurrency pool over a libSQL [`Database`].
pub struct ConnectionPool {
    db: Arc<Database>,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    stats: Arc<RwLock<PoolStatistics>>,
}

impl ConnectionPool {
    /// Build a pool over `db`, validating connectivity eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] if the database is
    /// unreachable.
    pub async fn new(db: Arc<Database>, config: PoolConfig) -> knowledge_core::Result<Self> {
        let semaphore = Arc::new(Semaphore::new(config.max_connections));
        let pool = Self {
            db,
            config,
            semaphore,
            stats: Arc::new(RwLock::new(PoolStatistics::default())),
        };
        pool.validate_database().await?;
        Ok(pool)
    }

    async fn validate_database(&self) -> knowledge_core::Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::DatabaseError(format!("failed to connect: {e}")))?;
        conn.query("SELECT 1", ())
            .await
            .map_err(|e| Error::DatabaseError(format!("database validation failed: {e}")))?;
        Ok(())
    }

    /// Check out a connection, waiting up to `connection_timeout` for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] on timeout or
    /// connection failure.
    pub async fn get(&self) -> knowledge_core::Result<PooledConnection> {
        let start = Instant::now();

        let permit = tokio::time::timeout(
            self.config.connection_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            Error::DatabaseError(format!(
                "connection pool timeout after {:?}: max {} connections in use",
                self.config.connection_timeout, self.config.max_connections
            ))
        })?
        .map_err(|e| Error::DatabaseError(format!("failed to acquire permit: {e}")))?;

        let conn = self
            .db
            .connect()
            .map_err(|e| Error::DatabaseError(format!("failed to create connection: {e}")))?;

        {
            let mut stats = self.stats.write();
            stats.total_created += 1;
            stats.total_checkouts += 1;
            stats.active_connections += 1;
        }

        debug!(wait = ?start.elapsed(), "connection acquired");

        Ok(PooledConnection {
            connection: Some(conn),
            _permit: permit,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Current pool statistics.
    #[must_use]
    pub fn statistics(&self) -> PoolStatistics {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> (ConnectionPool, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let db = libsql::Builder::new_local(dir.path().join("test.db"))
            .build()
            .await
            .unwrap();
        let pool = ConnectionPool::new(
            Arc::new(db),
            PoolConfig {
                max_connections: 2,
                connection_timeout: Duration::from_millis(200),
            },
        )
        .await
        .unwrap();
        (pool, dir)
    }

    #[tokio::test]
    async fn checkout_tracks_statistics_and_releases_on_drop() {
        let (pool, _dir) = test_pool().await;
        {
            let _conn = pool.get().await.unwrap();
            assert_eq!(pool.statistics().active_connections, 1);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.statistics().active_connections, 0);
        assert_eq!(pool.statistics().total_checkouts, 1);
    }

    #[tokio::test]
    async fn checkout_beyond_capacity_times_out() {
        let (pool, _dir) = test_pool().await;
        let _c1 = pool.get().await.unwrap();
        let _c2 = pool.get().await.unwrap();
        let result = pool.get().await;
        assert!(result.is_err());
    }
}
