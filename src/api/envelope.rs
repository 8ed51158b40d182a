//! Response types for the query API endpoints.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;

/// Uniform wrapper around every query API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// `0` on success, otherwise the HTTP status code.
    pub err_code: u16,
    pub err_msg: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Create a success envelope.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            err_code: 0,
            err_msg: "Success".to_string(),
            data: Some(data),
        }
    }

    /// Create an error envelope without data.
    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            err_code: status.as_u16(),
            err_msg: message.into(),
            data: None,
        }
    }
}

/// Payload of `GET /.api/requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    pub logs: Vec<AuditRecord>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl LogPage {
    #[must_use]
    pub fn new(logs: Vec<AuditRecord>, page: u32, size: u32, total: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total.div_ceil(u64::from(size))
        };
        Self {
            logs,
            page,
            size,
            total,
            total_pages,
        }
    }
}
