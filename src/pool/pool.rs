//! Bounded pool of reusable handles with lazy growth and release-time capping.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::error::PoolError;
use super::manager::Manager;

/// Default number of idle handles kept between operations.
pub const DEFAULT_MAX_IDLE: usize = 10;

/// Snapshot of pool occupancy and lifetime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Handles currently parked in the idle set.
    pub idle: usize,
    /// Configured maximum size of the idle set.
    pub max_idle: usize,
    /// Handles constructed since the pool was created.
    pub created: u64,
    /// Handles closed because the idle set was full or reset failed.
    pub discarded: u64,
}

struct PoolInner<M: Manager> {
    manager: M,
    max_idle: usize,
    idle: Mutex<Vec<M::Connection>>,
    created: AtomicU64,
    discarded: AtomicU64,
}

impl<M: Manager> PoolInner<M> {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<M::Connection>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, mut conn: M::Connection) {
        if let Err(err) = self.manager.reset(&mut conn) {
            tracing::warn!(error = %err, "Pooled connection failed to reset, discarding");
            self.discard(conn);
            return;
        }

        let overflow = {
            let mut idle = self.lock_idle();
            if idle.len() < self.max_idle {
                idle.push(conn);
                None
            } else {
                Some(conn)
            }
        };

        if let Some(conn) = overflow {
            tracing::trace!(max_idle = self.max_idle, "Idle set full, closing connection");
            self.discard(conn);
        }
    }

    fn discard(&self, conn: M::Connection) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.manager.close(conn) {
            tracing::warn!(error = %err, "Failed to close discarded connection");
        }
    }
}

/// A pool of reusable handles produced by a [`Manager`].
///
/// `acquire` never waits: it reuses an idle handle or builds a new one. The
/// bound is applied on release, where handles beyond `max_idle` are closed.
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<M: Manager> Pool<M> {
    /// Create an empty pool. No handle is opened until the first `acquire`.
    #[must_use]
    pub fn new(manager: M, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                manager,
                max_idle,
                idle: Mutex::new(Vec::with_capacity(max_idle)),
                created: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the manager backing this pool.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Take a handle, reusing an idle one when available.
    ///
    /// The returned guard gives the handle back when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Backend`] if a new handle had to be built and the
    /// backend refused.
    pub fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        let reused = self.inner.lock_idle().pop();

        let conn = match reused {
            Some(conn) => conn,
            None => {
                let conn = self.inner.manager.connect().map_err(PoolError::backend)?;
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Opened new pooled connection");
                conn
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Current occupancy and counters.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            idle: self.inner.lock_idle().len(),
            max_idle: self.inner.max_idle,
            created: self.inner.created.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive ownership of one pooled handle.
///
/// Dropping the guard releases the handle: it is reset and parked, or closed.
pub struct PooledConnection<M: Manager> {
    conn: Option<M::Connection>,
    pool: Arc<PoolInner<M>>,
}

impl<M: Manager> PooledConnection<M> {
    /// Give the handle back to its pool. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl<M: Manager> std::fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl<M: Manager> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &M::Connection {
        // Only `Drop` takes the handle out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<M: Manager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut M::Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<M: Manager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
