//! HTTP handlers for the query API.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::routing::get;
use axum::Json;
use serde::Serialize;

use super::envelope::{Envelope, LogPage};
use super::error::ApiError;
use crate::audit::{urlencoded_fields, AuditPipeline, AuditRecord, FieldMap};
use crate::pool::PoolStatus;
use crate::registry::{MountedUnit, RouteSet, UnitRegistry};
use crate::store::LogFilter;

/// Mount prefix of the query API.
pub const API_PREFIX: &str = "/.api";

/// Default page size for `GET /.api/requests`.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// State shared by the query API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<AuditPipeline>,
    pub registry: Arc<UnitRegistry>,
}

impl ApiState {
    #[must_use]
    pub fn new(pipeline: Arc<AuditPipeline>, registry: Arc<UnitRegistry>) -> Self {
        Self { pipeline, registry }
    }
}

/// Route set of the query API, to be registered as a host-native unit.
#[must_use]
pub fn routes(state: ApiState) -> RouteSet {
    RouteSet::new(API_PREFIX)
        .route("/requests", get(list_requests).with_state(state.clone()))
        .route(
            "/requests/:request_id",
            get(get_request).with_state(state.clone()),
        )
        .route("/modules", get(list_modules).with_state(state.clone()))
        .route("/units", get(list_units).with_state(state.clone()))
        .route("/status", get(get_status).with_state(state))
}

fn parse_param<T: FromStr>(
    params: &FieldMap,
    name: &'static str,
    default: T,
) -> Result<T, ApiError> {
    match params.get(name).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ApiError::BadRequest {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_optional<T: FromStr>(params: &FieldMap, name: &'static str) -> Result<Option<T>, ApiError> {
    params
        .get(name)
        .filter(|v| !v.is_empty())
        .map(|raw| {
            raw.parse().map_err(|_| ApiError::BadRequest {
                name,
                value: raw.to_string(),
            })
        })
        .transpose()
}

/// Build a store filter from the list endpoint's query string.
fn filter_from(params: &FieldMap) -> Result<LogFilter, ApiError> {
    let mut filter = LogFilter::new();
    if let Some(start) = parse_optional::<f64>(params, "start_time")? {
        filter = filter.since(start);
    }
    if let Some(end) = parse_optional::<f64>(params, "end_time")? {
        filter = filter.until(end);
    }
    for unit in params.get_all("module").iter().filter(|m| !m.is_empty()) {
        filter = filter.unit(unit.as_str());
    }
    // A non-numeric status code means "no status filter".
    if let Some(code) = params.get("status_code").and_then(|c| c.parse().ok()) {
        filter = filter.status(code);
    }
    Ok(filter)
}

/// GET /.api/requests - Paginated request logs, newest first.
pub async fn list_requests(
    State(state): State<ApiState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Envelope<LogPage>>, ApiError> {
    let params = query
        .map(|q| urlencoded_fields(q.as_bytes()))
        .unwrap_or_default();

    let page = parse_param(&params, "page", 1_u32)?;
    let size = parse_param(&params, "size", DEFAULT_PAGE_SIZE)?.min(MAX_PAGE_SIZE);
    let filter = filter_from(&params)?;

    let store = state.pipeline.store();
    let total = store.count(&filter).await?;
    let logs = store.query(&filter, page, size).await?;

    Ok(Json(Envelope::success(LogPage::new(logs, page, size, total))))
}

/// GET /.api/requests/:request_id - One request log by correlation id.
pub async fn get_request(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
) -> Result<Json<Envelope<AuditRecord>>, ApiError> {
    state
        .pipeline
        .store()
        .get_by_correlation_id(&request_id)
        .await?
        .map(|record| Json(Envelope::success(record)))
        .ok_or(ApiError::NotFound(request_id))
}

/// GET /.api/modules - Unit names that appear in the stored logs.
pub async fn list_modules(
    State(state): State<ApiState>,
) -> Result<Json<Envelope<Vec<String>>>, ApiError> {
    let units = state.pipeline.store().list_distinct_units().await?;
    Ok(Json(Envelope::success(units)))
}

/// GET /.api/units - Currently mounted feature units.
pub async fn list_units(
    State(state): State<ApiState>,
) -> Json<Envelope<BTreeMap<String, MountedUnit>>> {
    Json(Envelope::success(state.registry.list_mounted()))
}

/// Payload of `GET /.api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub pool: PoolStatus,
    /// Requests started but not yet finished.
    pub in_flight: usize,
    pub units: usize,
}

/// GET /.api/status - Pool and pipeline counters.
pub async fn get_status(State(state): State<ApiState>) -> Json<Envelope<StatusResponse>> {
    Json(Envelope::success(StatusResponse {
        pool: state.pipeline.store().pool().status(),
        in_flight: state.pipeline.in_flight(),
        units: state.registry.list_mounted().len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> FieldMap {
        urlencoded_fields(query.as_bytes())
    }

    #[test]
    fn test_parse_param_defaults_and_errors() {
        let p = params("page=3&size=");
        assert_eq!(parse_param(&p, "page", 1_u32).unwrap(), 3);
        assert_eq!(parse_param(&p, "size", DEFAULT_PAGE_SIZE).unwrap(), 10);

        let err = parse_param(&params("page=two"), "page", 1_u32).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { name: "page", .. }));
    }

    #[test]
    fn test_filter_from_query() {
        let filter =
            filter_from(&params("module=example&module=&module=other&status_code=200&start_time=1.5"))
                .unwrap();
        assert_eq!(filter.units, vec!["example".to_string(), "other".to_string()]);
        assert_eq!(filter.status_code, Some(200));
        assert_eq!(filter.start_time, Some(1.5));
        assert_eq!(filter.end_time, None);
    }

    #[test]
    fn test_filter_ignores_non_numeric_status() {
        let filter = filter_from(&params("status_code=ok")).unwrap();
        assert_eq!(filter.status_code, None);
    }

    #[test]
    fn test_filter_rejects_bad_time() {
        let err = filter_from(&params("end_time=yesterday")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { name: "end_time", .. }));
    }
}
