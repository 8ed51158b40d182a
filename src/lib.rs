//! HTTP Auditor - self-instrumenting HTTP server with a queryable request log.

pub mod api;
pub mod audit;
pub mod config;
pub mod pool;
pub mod registry;
pub mod server;
pub mod store;
pub mod units;
