//! Audit pipeline turning HTTP traffic into persisted request records.

mod capture;
mod error;
mod middleware;
mod pipeline;
mod record;

pub use capture::{capture_body, header_fields, urlencoded_fields, RequestView, ResponseView};
pub use error::AuditError;
pub use middleware::audit_requests;
pub use pipeline::{AuditPipeline, DEFAULT_MAX_BODY_BYTES};
pub use record::{AuditRecord, CorrelationId, FieldMap};
