//! Bounded resource pool for persistence handles.

mod error;
mod manager;
#[allow(clippy::module_inception)]
mod pool;

pub use error::PoolError;
pub use manager::{Manager, SqliteManager, BUSY_TIMEOUT};
pub use pool::{Pool, PoolStatus, PooledConnection, DEFAULT_MAX_IDLE};
