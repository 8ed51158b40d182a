//! Owned snapshots of the request and response an audit record is built from.

use std::net::SocketAddr;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::ConnectInfo;
use axum::http::{header, request, response, HeaderMap};
use serde_json::Value;

use super::error::AuditError;
use super::record::FieldMap;

/// Buffer `body` for auditing without changing what the receiver gets.
///
/// Only bodies whose size is known and within `limit` are read; anything else
/// is passed through untouched together with an error describing why.
pub async fn capture_body(body: Body, limit: usize) -> (Body, Result<Bytes, AuditError>) {
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|upper| usize::try_from(upper).is_ok_and(|n| n <= limit));
    if !fits {
        return (body, Err(AuditError::BodyNotCaptured { limit }));
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => (Body::from(bytes.clone()), Ok(bytes)),
        Err(err) => (Body::empty(), Err(AuditError::BodyRead(err))),
    }
}

/// Flatten a header map, keeping repeated headers as multiple values.
#[must_use]
pub fn header_fields(headers: &HeaderMap) -> FieldMap {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Parse an `application/x-www-form-urlencoded` string.
#[must_use]
pub fn urlencoded_fields(input: &[u8]) -> FieldMap {
    url::form_urlencoded::parse(input).collect()
}

fn media_type(headers: &FieldMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE.as_str())
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
}

/// What the pipeline needs to know about an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub query: FieldMap,
    pub client_ip: Option<String>,
    pub headers: FieldMap,
    /// Captured body; `None` when it was not buffered.
    pub body: Option<Bytes>,
}

impl RequestView {
    /// Snapshot request head `parts` plus an optionally captured body.
    #[must_use]
    pub fn from_parts(parts: &request::Parts, body: Option<Bytes>) -> Self {
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts
                .uri
                .query()
                .map(|q| urlencoded_fields(q.as_bytes()))
                .unwrap_or_default(),
            client_ip,
            headers: header_fields(&parts.headers),
            body,
        }
    }

    /// Lower-cased media type without parameters.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        media_type(&self.headers)
    }

    /// Form fields, when the body is URL-encoded form data.
    #[must_use]
    pub fn form(&self) -> FieldMap {
        match (&self.body, self.media_type()) {
            (Some(body), Some(mt)) if mt == "application/x-www-form-urlencoded" => {
                urlencoded_fields(body)
            }
            _ => FieldMap::new(),
        }
    }

    /// Parsed body, when the content type declares JSON and the body parses.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        let media_type = self.media_type()?;
        if media_type != "application/json" && !media_type.ends_with("+json") {
            return None;
        }
        serde_json::from_slice(self.body.as_ref()?).ok()
    }
}

/// What the pipeline needs to know about the produced response.
#[derive(Debug, Clone, Default)]
pub struct ResponseView {
    pub status: u16,
    pub headers: FieldMap,
    /// Captured body; `None` when it was not buffered.
    pub body: Option<Bytes>,
}

impl ResponseView {
    /// Snapshot response head `parts` plus an optionally captured body.
    #[must_use]
    pub fn from_parts(parts: &response::Parts, body: Option<Bytes>) -> Self {
        Self {
            status: parts.status.as_u16(),
            headers: header_fields(&parts.headers),
            body,
        }
    }

    /// Body as JSON when it parses, otherwise as a JSON string of the raw text.
    ///
    /// Absent and empty bodies yield `None`.
    #[must_use]
    pub fn data(&self) -> Option<Value> {
        let body = self.body.as_ref().filter(|b| !b.is_empty())?;
        Some(
            serde_json::from_slice(body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
        )
    }
}
