//! Pool error types.

/// Errors that can occur while handing out pooled handles.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// The backend could not construct a new handle.
    #[error("Failed to create pooled connection: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PoolError {
    /// Wrap a backend error.
    pub fn backend(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_display() {
        let err = PoolError::backend(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        ));
        assert!(err.to_string().contains("Failed to create pooled connection"));
        assert!(err.to_string().contains("read-only filesystem"));
    }

    #[test]
    fn test_backend_source_is_preserved() {
        use std::error::Error as _;

        let err = PoolError::backend(std::io::Error::other("boom"));
        assert_eq!(err.source().map(ToString::to_string), Some("boom".to_string()));
    }
}
