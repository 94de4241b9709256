//! # Resource Manager
//!
//! Bounded admission control over LLM calls and database connections
//! (spec.md §4.5). `tokio::sync::Semaphore` is FIFO with respect to
//! acquisition order, which is what gives `with_ai`/`with_database` their
//! fairness guarantee. Permits are advisory: the manager never opens a
//! connection or an HTTP client itself, it only serializes contention.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::types::ResourceLimits;
use crate::Result;

/// A point-in-time snapshot of permit availability and memory pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceStatus {
    /// AI-call permits currently available.
    pub ai_permits_available: usize,
    /// AI-call permits configured in total.
    pub ai_permits_total: usize,
    /// Database-connection permits currently available.
    pub db_permits_available: usize,
    /// Database-connection permits configured in total.
    pub db_permits_total: usize,
    /// Coarse memory-pressure reading in `[0, 1]`; advisory only, never
    /// blocks admission (spec.md §4.5 names "memory awareness" without
    /// pinning a shape — see `SPEC_FULL.md` §4).
    pub memory_pressure: f32,
}

/// Per-job bounded admission control.
///
/// One `ResourceManager` is constructed per job from that job's
/// [`ResourceLimits`] (or the process defaults); it is not shared across
/// jobs, so no cross-job locking is needed (spec.md §5).
pub struct ResourceManager {
    ai_semaphore: Arc<Semaphore>,
    db_semaphore: Arc<Semaphore>,
    ai_total: usize,
    db_total: usize,
}

impl ResourceManager {
    /// Build a manager from the given limits. A limit of zero is legal:
    /// every `with_*` call then queues indefinitely.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            ai_semaphore: Arc::new(Semaphore::new(limits.max_ai_calls)),
            db_semaphore: Arc::new(Semaphore::new(limits.max_connections)),
            ai_total: limits.max_ai_calls,
            db_total: limits.max_connections,
        }
    }

    /// Run `f` once an AI-call permit is available. The permit is released
    /// when `f` completes, whether it succeeded or failed.
    ///
    /// # Errors
    ///
    /// Propagates whatever error `f` returns.
    pub async fn with_ai<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .ai_semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");
        f().await
    }

    /// Run `f` once a database-connection permit is available.
    ///
    /// # Errors
    ///
    /// Propagates whatever error `f` returns.
    pub async fn with_database<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .db_semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");
        f().await
    }

    /// A snapshot of current permit availability. `memory_pressure` is
    /// always `0.0` in this process-local implementation — there is no
    /// portable, dependency-free way to read RSS here, and spec.md treats
    /// it as advisory.
    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        ResourceStatus {
            ai_permits_available: self.ai_semaphore.available_permits(),
            ai_permits_total: self.ai_total,
            db_permits_available: self.db_semaphore.available_permits(),
            db_permits_total: self.db_total,
            memory_pressure: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrent_ai_calls() {
        let manager = Arc::new(ResourceManager::new(ResourceLimits {
            max_ai_calls: 2,
            max_connections: 2,
        }));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                manager
                    .with_ai(|| async {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, crate::Error>(())
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_permits_still_admits_eventually() {
        let manager = ResourceManager::new(ResourceLimits {
            max_ai_calls: 0,
            max_connections: 0,
        });
        assert_eq!(manager.status().ai_permits_available, 0);
    }

    #[tokio::test]
    async fn releases_permit_on_failure() {
        let manager = ResourceManager::new(ResourceLimits {
            max_ai_calls: 1,
            max_connections: 1,
        });

        let result = manager
            .with_ai(|| async { Err::<(), _>(crate::Error::AiExtraction("boom".into())) })
            .await;
        assert!(result.is_err());

        // The permit must have been released, or this would hang.
        let ok = manager.with_ai(|| async { Ok::<_, crate::Error>(()) }).await;
        assert!(ok.is_ok());
    }
}
