//! Example feature unit showing how a unit exposes its routes.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{json, Value};

use crate::registry::{FactoryError, FeatureUnit, RouteSet, UnitRegistration};

/// Registration name of this unit.
pub const NAME: &str = "example";

/// Default number of items returned by `/data`.
const DEFAULT_COUNT: usize = 5;

/// Upper bound on items returned by `/data`.
const MAX_ITEMS: usize = 100;

/// The example unit, mounted at `/example`.
#[derive(Debug, Default)]
pub struct ExampleUnit;

impl FeatureUnit for ExampleUnit {
    fn routes(&self) -> Option<RouteSet> {
        Some(
            RouteSet::new(format!("/{NAME}"))
                .route("/", get(info))
                .route("/data", get(data))
                .route("/submit", post(submit)),
        )
    }
}

fn factory() -> Result<Box<dyn FeatureUnit>, FactoryError> {
    Ok(Box::new(ExampleUnit))
}

/// Catalog entry for the example unit.
#[must_use]
pub fn registration() -> UnitRegistration {
    UnitRegistration::new(NAME, factory)
        .version("1.0.0")
        .description("Example feature unit")
}

async fn info() -> Json<Value> {
    Json(json!({
        "message": "This is an example unit",
        "version": "1.0.0",
        "status": "active",
    }))
}

async fn data(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let count = params
        .get("count")
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(DEFAULT_COUNT)
        .min(MAX_ITEMS);
    let data_type = params
        .get("type")
        .map_or("default", String::as_str)
        .to_string();

    let items: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "id": i,
                "value": format!("Example item {i}"),
                "type": data_type,
            })
        })
        .collect();

    Json(json!({
        "count": items.len(),
        "type": data_type,
        "data": items,
    }))
}

async fn submit(headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Value>) {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Request body must be JSON"})),
        );
    }

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Request body is not valid JSON"})),
        );
    };

    let Some(name) = payload.get("name").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing required field: name"})),
        );
    };

    let message = format!("Submitted data for {name}");
    (
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": message,
            "received_data": payload,
        })),
    )
}
