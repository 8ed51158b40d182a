//! Persistent, queryable log of audit records.

mod error;
mod filter;
mod log_store;
mod schema;

pub use error::StoreError;
pub use filter::LogFilter;
pub use log_store::{default_db_path, LogStore};
pub use schema::{SCHEMA, SCHEMA_VERSION};
