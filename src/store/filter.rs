//! Record filters and their SQL rendering.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Constraints applied by `count` and `query`. Empty fields impose nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// Inclusive lower bound on the request start time (epoch seconds).
    pub start_time: Option<f64>,
    /// Inclusive upper bound on the request start time (epoch seconds).
    pub end_time: Option<f64>,
    /// Unit names to match; a record matches if its unit is any of these.
    pub units: Vec<String>,
    /// Exact response status code.
    pub status_code: Option<u16>,
}

impl LogFilter {
    /// A filter that matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only records that started at or after `start`.
    #[must_use]
    pub fn since(mut self, start: f64) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Only records that started at or before `end`.
    #[must_use]
    pub fn until(mut self, end: f64) -> Self {
        self.end_time = Some(end);
        self
    }

    /// Add a unit name to the match set.
    #[must_use]
    pub fn unit(mut self, name: impl Into<String>) -> Self {
        self.units.push(name.into());
        self
    }

    /// Only records with this status code.
    #[must_use]
    pub fn status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Render as a `WHERE` clause (possibly empty) plus positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(start) = self.start_time {
            clauses.push("timestamp >= ?".to_string());
            params.push(Value::Real(start));
        }
        if let Some(end) = self.end_time {
            clauses.push("timestamp <= ?".to_string());
            params.push(Value::Real(end));
        }
        if !self.units.is_empty() {
            let placeholders = vec!["?"; self.units.len()].join(", ");
            clauses.push(format!("module IN ({placeholders})"));
            params.extend(self.units.iter().cloned().map(Value::Text));
        }
        if let Some(code) = self.status_code {
            clauses.push("status_code = ?".to_string());
            params.push(Value::Integer(i64::from(code)));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}
