//! Server error types.

use std::net::SocketAddr;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors that can occur while starting or running the server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The log store could not be opened.
    #[error("Failed to open log store: {0}")]
    Store(#[from] StoreError),

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let error = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            source: io_error,
        };
        assert!(error
            .to_string()
            .contains("Failed to bind to 127.0.0.1:5000"));
        assert!(error.to_string().contains("address in use"));
    }

    #[test]
    fn test_store_error_display() {
        let error = ServerError::from(StoreError::TaskCancelled);
        assert!(error.to_string().starts_with("Failed to open log store"));
    }

    #[test]
    fn test_serve_error_display() {
        let error = ServerError::Serve(std::io::Error::other("connection reset"));
        assert_eq!(error.to_string(), "Server error: connection reset");
    }
}
