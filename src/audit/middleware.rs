//! axum middleware driving the audit hooks around every request.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::capture::{capture_body, RequestView, ResponseView};
use super::error::AuditError;
use super::pipeline::AuditPipeline;
use super::record::CorrelationId;

/// Runs teardown when the request future finishes or is dropped.
struct TeardownGuard<'a> {
    pipeline: &'a AuditPipeline,
    id: &'a CorrelationId,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.on_request_teardown(self.id);
    }
}

fn captured(result: Result<Bytes, AuditError>, side: &'static str) -> Option<Bytes> {
    match result {
        Ok(bytes) => Some(bytes),
        Err(err @ AuditError::BodyNotCaptured { .. }) => {
            tracing::debug!(side, error = %err, "Body left out of audit record");
            None
        }
        Err(err) => {
            tracing::warn!(side, error = %err, "Failed to capture body for audit record");
            None
        }
    }
}

/// Audit every request that is not bound for an excluded unit.
///
/// The correlation id is inserted into request extensions for handlers that
/// want it. Install with `axum::middleware::from_fn_with_state`.
pub async fn audit_requests(
    State(pipeline): State<Arc<AuditPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let unit = pipeline.classify(request.uri().path());
    let Some(correlation_id) = pipeline.on_request_start(unit.as_deref()) else {
        return next.run(request).await;
    };
    let _teardown = TeardownGuard {
        pipeline: &pipeline,
        id: &correlation_id,
    };
    let limit = pipeline.max_body_bytes();

    let (mut parts, body) = request.into_parts();
    let (body, request_body) = capture_body(body, limit).await;
    let request_view = RequestView::from_parts(&parts, captured(request_body, "request"));
    parts.extensions.insert(correlation_id.clone());

    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    let (body, response_body) = capture_body(body, limit).await;
    let response_view = ResponseView::from_parts(&parts, captured(response_body, "response"));

    pipeline.on_request_end(&correlation_id, &request_view, &response_view);

    Response::from_parts(parts, body)
}
