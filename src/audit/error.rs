//! Audit construction error types.

/// Errors raised while assembling an audit record.
///
/// These are logged and dropped by the pipeline; the client never sees them.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    /// The body has no known size or exceeds the capture limit.
    #[error("Body not captured: size unknown or above {limit} bytes")]
    BodyNotCaptured { limit: usize },

    /// Reading the body stream failed.
    #[error("Failed to read body: {0}")]
    BodyRead(#[source] axum::Error),
}
