//! # Knowledge Store SQL
//!
//! The reference [`knowledge_core::store::StoreAdapter`] implementation:
//! libSQL/Turso for persistence, brute-force cosine similarity (spec.md
//! §6.4) for vector search.
//!
//! ```no_run
//! use knowledge_store_sql::KnowledgeSqlStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = KnowledgeSqlStore::new("file:knowledge.db", "").await?;
//! store.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use knowledge_core::{Error, Result};
use libsql::{Builder, Connection, Database};
use tracing::{debug, error, info, warn};

pub mod convert;
pub mod pool;
pub mod schema;
pub mod storage;
pub mod vector_format;

pub use pool::{ConnectionPool, PoolConfig, PoolStatistics};

/// Retry/backoff tuning for DDL and write statements.
#[derive(Debug, Clone)]
pub struct SqlStoreConfig {
    /// Maximum retry attempts for a failed statement.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub retry_base_delay: Duration,
    /// Cap on the exponential backoff delay.
    pub retry_max_delay: Duration,
    /// Whether to route connections through a [`ConnectionPool`].
    pub enable_pooling: bool,
    /// Pool sizing, used when `enable_pooling` is set.
    pub pool: PoolConfig,
}

impl Default for SqlStoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(5),
            enable_pooling: true,
            pool: PoolConfig::default(),
        }
    }
}

/// libSQL-backed [`knowledge_core::store::StoreAdapter`].
pub struct KnowledgeSqlStore {
    db: Arc<Database>,
    pool: Option<Arc<ConnectionPool>>,
    config: SqlStoreConfig,
}

impl KnowledgeSqlStore {
    /// Open `url` (`libsql://`, `file:`, or `:memory:`) with default tuning.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] on connection
    /// failure or an insecure/unsupported URL scheme.
    pub async fn new(url: &str, token: &str) -> Result<Self> {
        Self::with_config(url, token, SqlStoreConfig::default()).await
    }

    /// Open `url` with explicit tuning.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] on connection
    /// failure or an insecure/unsupported URL scheme.
    pub async fn with_config(url: &str, token: &str, config: SqlStoreConfig) -> Result<Self> {
        info!(url, "connecting to knowledge store");

        if !url.starts_with("libsql://") && !url.starts_with("file:") && !url.starts_with(":memory:")
        {
            return Err(Error::DatabaseError(format!(
                "insecure database url: {url}. only libsql://, file:, or :memory: are allowed"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::DatabaseError(
                "authentication token required for remote connections".to_string(),
            ));
        }

        let db = if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::DatabaseError(format!("failed to build remote db: {e}")))?
        } else {
            Builder::new_local(url.trim_start_matches("file:"))
                .build()
                .await
                .map_err(|e| Error::DatabaseError(format!("failed to build local db: {e}")))?
        };

        Self::from_database(db, config).await
    }

    /// Wrap an already-built [`Database`] (useful for tests against a
    /// temp-file or in-memory database).
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] if pooling is
    /// enabled and the pool fails to validate connectivity.
    pub async fn from_database(db: Database, config: SqlStoreConfig) -> Result<Self> {
        let db = Arc::new(db);
        let pool = if config.enable_pooling {
            Some(Arc::new(
                ConnectionPool::new(Arc::clone(&db), config.pool.clone()).await?,
            ))
        } else {
            None
        };
        Ok(Self { db, pool, config })
    }

    /// Get a connection, routed through the pool when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] on connection
    /// failure.
    pub(crate) async fn get_connection(&self) -> Result<Connection> {
        if let Some(pool) = &self.pool {
            pool.get().await?.into_inner()
        } else {
            self.db
                .connect()
                .map_err(|e| Error::DatabaseError(format!("failed to get connection: {e}")))
        }
    }

    /// Create every table/index if missing (spec.md §6: the adapter owns
    /// its own schema).
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] if any DDL statement
    /// fails after retries.
    pub async fn initialize_schema(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        for statement in schema::ALL_STATEMENTS {
            self.execute_with_retry(&conn, statement).await?;
        }
        info!("knowledge store schema initialized");
        Ok(())
    }

    pub(crate) async fn execute_with_retry(&self, conn: &Connection, sql: &str) -> Result<()> {
        let mut attempts = 0;
        let mut delay = self.config.retry_base_delay;

        loop {
            match conn.execute(sql, ()).await {
                Ok(_) => {
                    if attempts > 0 {
                        debug!(attempts, "sql succeeded after retries");
                    }
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        error!(attempts, error = %e, "sql failed after retries");
                        return Err(Error::DatabaseError(format!(
                            "sql execution failed after {attempts} retries: {e}"
                        )));
                    }
                    warn!(attempts, error = %e, "sql attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.retry_max_delay);
                }
            }
        }
    }

    /// Liveness check: `SELECT 1`.
    ///
    /// # Errors
    ///
    /// Returns [`knowledge_core::Error::DatabaseError`] if the connection or
    /// query fails.
    pub async fn health_check(&self) -> Result<bool> {
        let conn = self.get_connection().await?;
        conn.query("SELECT 1", ())
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
        Ok(true)
    }
}
