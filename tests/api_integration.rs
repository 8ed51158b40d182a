//! Integration tests for the query API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use http_auditor::audit::AuditPipeline;
use http_auditor::config::AppConfig;
use http_auditor::server::HostServer;
use http_auditor::store::LogStore;
use http_auditor::units::builtin_catalog;

async fn app(temp_dir: &TempDir) -> (Router, Arc<AuditPipeline>) {
    let store = LogStore::open(temp_dir.path().join("requests.db"), 4)
        .await
        .expect("Failed to open log store");
    let server = HostServer::with_store(AppConfig::default(), builtin_catalog(), store);
    let pipeline = Arc::clone(server.pipeline());
    (server.into_router(), pipeline)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response: Response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Issue `count` audited requests, one after another, and wait for their records.
async fn generate_traffic(app: &Router, pipeline: &AuditPipeline, count: usize) {
    for i in 1..=count {
        let (status, _) = get_json(app, &format!("/example/data?count={i}")).await;
        assert_eq!(status, StatusCode::OK);
    }
    pipeline.flush().await;
}

/// Test the list envelope and pagination over 15 records.
#[tokio::test]
async fn test_list_requests_pagination() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;
    generate_traffic(&app, &pipeline, 15).await;

    let (status, body) = get_json(&app, "/.api/requests?page=2&size=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errCode"], 0);
    assert_eq!(body["errMsg"], "Success");

    let data = &body["data"];
    assert_eq!(data["page"], 2);
    assert_eq!(data["size"], 10);
    assert_eq!(data["total"], 15);
    assert_eq!(data["total_pages"], 2);

    // Second page holds the five oldest records, newest first.
    let logs = data["logs"].as_array().unwrap();
    let ids: Vec<i64> = logs.iter().map(|l| l["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    assert_eq!(logs[4]["request_args"]["count"], "1");
    assert_eq!(logs[0]["module"], "example");
}

/// Test defaults and out-of-range pages.
#[tokio::test]
async fn test_list_requests_defaults_and_empty_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;
    generate_traffic(&app, &pipeline, 12).await;

    let (_, body) = get_json(&app, "/.api/requests").await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["size"], 10);
    assert_eq!(body["data"]["logs"].as_array().unwrap().len(), 10);

    let (_, body) = get_json(&app, "/.api/requests?page=9").await;
    assert!(body["data"]["logs"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total"], 12);

    let (_, body) = get_json(&app, "/.api/requests?page=0").await;
    assert!(body["data"]["logs"].as_array().unwrap().is_empty());
}

/// Test that invalid numeric parameters are rejected with an error envelope.
#[tokio::test]
async fn test_list_requests_bad_page() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, _pipeline) = app(&temp_dir).await;

    let (status, body) = get_json(&app, "/.api/requests?page=two").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errCode"], 400);
    assert_eq!(body["data"], Value::Null);
}

/// Test module and status filters.
#[tokio::test]
async fn test_list_requests_filters() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;
    generate_traffic(&app, &pipeline, 3).await;
    let (status, _) = get_json(&app, "/not-mounted").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    pipeline.flush().await;

    let (_, body) = get_json(&app, "/.api/requests?module=example").await;
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = get_json(&app, "/.api/requests?module=&module=example&module=other").await;
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = get_json(&app, "/.api/requests?status_code=404").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["logs"][0]["module"], Value::Null);

    // Non-numeric status codes are ignored.
    let (_, body) = get_json(&app, "/.api/requests?status_code=abc").await;
    assert_eq!(body["data"]["total"], 4);

    let (_, body) = get_json(&app, "/.api/requests?start_time=4102444800").await;
    assert_eq!(body["data"]["total"], 0);
}

/// Test the detail endpoint for found and missing ids.
#[tokio::test]
async fn test_request_detail() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;
    generate_traffic(&app, &pipeline, 1).await;

    let (_, body) = get_json(&app, "/.api/requests?size=1").await;
    let request_id = body["data"]["logs"][0]["request_id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = get_json(&app, &format!("/.api/requests/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errCode"], 0);
    assert_eq!(body["data"]["request_id"], request_id.as_str());
    assert_eq!(body["data"]["url"], "/example/data");
    assert_eq!(body["data"]["response_data"]["count"], 1);

    let (status, body) = get_json(&app, "/.api/requests/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errCode"], 404);
    assert_eq!(body["data"], Value::Null);
}

/// Test the distinct module list.
#[tokio::test]
async fn test_list_modules() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;

    let (_, body) = get_json(&app, "/.api/modules").await;
    assert_eq!(body["data"], serde_json::json!([]));

    generate_traffic(&app, &pipeline, 2).await;
    get_json(&app, "/elsewhere").await;
    pipeline.flush().await;

    let (status, body) = get_json(&app, "/.api/modules").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!(["example"]));
}

/// Test the mounted unit view.
#[tokio::test]
async fn test_list_units() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, _pipeline) = app(&temp_dir).await;

    let (status, body) = get_json(&app, "/.api/units").await;
    assert_eq!(status, StatusCode::OK);

    let units = body["data"].as_object().unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units["base"]["prefix"], "/.api");
    assert_eq!(units["example"]["prefix"], "/example");
    assert_eq!(units["example"]["version"], "1.0.0");
    assert_eq!(units["example"]["enabled"], true);
    assert_eq!(units["example"]["routes"].as_array().unwrap().len(), 3);
}

/// Test the status counters.
#[tokio::test]
async fn test_status() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (app, pipeline) = app(&temp_dir).await;
    generate_traffic(&app, &pipeline, 2).await;

    let (status, body) = get_json(&app, "/.api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["in_flight"], 0);
    assert_eq!(body["data"]["units"], 2);
    assert_eq!(body["data"]["pool"]["max_idle"], 4);
    assert!(body["data"]["pool"]["created"].as_u64().unwrap() >= 1);
}
