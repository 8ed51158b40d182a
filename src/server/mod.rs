//! Host HTTP server.

mod error;
mod host;

pub use error::ServerError;
pub use host::HostServer;
