//! Request log persistence on top of the connection pool.

use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::error::StoreError;
use super::filter::LogFilter;
use super::schema::{RECORD_COLUMNS, SCHEMA, SCHEMA_VERSION};
use crate::audit::{AuditRecord, CorrelationId, FieldMap};
use crate::pool::{Pool, SqliteManager};

/// Returns the default path for the request log database.
///
/// This is `~/.local/share/http-auditor/requests.db` on Unix systems.
#[must_use]
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("http-auditor")
        .join("requests.db")
}

/// Durable, queryable store of audit records.
///
/// Every operation takes a pooled connection inside `spawn_blocking` and
/// returns it before completing, on success and on error.
#[derive(Debug, Clone)]
pub struct LogStore {
    pool: Pool<SqliteManager>,
}

impl LogStore {
    /// Open the store at `path`, creating parent directories and the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// cannot be opened, or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>, max_idle: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let store = Self::with_pool(Pool::new(SqliteManager::new(&path), max_idle));
        store.init_schema().await.map_err(|err| match err {
            StoreError::Pool(source) => StoreError::DatabaseOpen { path, source },
            other => other,
        })?;
        Ok(store)
    }

    /// Wrap an existing pool without touching the schema.
    #[must_use]
    pub fn with_pool(pool: Pool<SqliteManager>) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }

    /// Returns the path to the database.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.pool.manager().path()
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let conn = pool.acquire()?;
            op(&conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// Create tables and indexes if absent. Safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })
        .await
    }

    /// Persist a record, logging and swallowing any failure.
    ///
    /// The request path calls this; a broken store must never fail a request.
    pub async fn insert(&self, record: &AuditRecord) {
        match self.try_insert(record).await {
            Ok(id) => tracing::trace!(id, request_id = %record.correlation_id, "Audit record stored"),
            Err(err) => tracing::warn!(
                request_id = %record.correlation_id,
                error = %err,
                "Failed to persist audit record"
            ),
        }
    }

    /// Persist a record and return its insertion sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the insert fails.
    pub async fn try_insert(&self, record: &AuditRecord) -> Result<i64, StoreError> {
        let request_id = record.correlation_id.to_string();
        let method = record.method.clone();
        let url = record.url.clone();
        let client_ip = record.client_ip.clone();
        let request_headers = encode("request_headers", &record.request_headers)?;
        let request_args = encode("request_args", &record.request_args)?;
        let request_form = encode("request_form", &record.request_form)?;
        let request_json = record
            .request_json
            .as_ref()
            .map(|value| encode("request_json", value))
            .transpose()?;
        let status_code = record.status_code;
        let response_headers = encode("response_headers", &record.response_headers)?;
        let response_data = record
            .response_data
            .as_ref()
            .map(|value| encode("response_data", value))
            .transpose()?;
        let process_time = record.duration_ms;
        let timestamp = record.timestamp;
        let module = record.unit.clone();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO request_logs (
                    request_id, method, url, client_ip, request_headers, request_args,
                    request_form, request_json, status_code, response_headers,
                    response_data, process_time, timestamp, module
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    request_id,
                    method,
                    url,
                    client_ip,
                    request_headers,
                    request_args,
                    request_form,
                    request_json,
                    status_code,
                    response_headers,
                    response_data,
                    process_time,
                    timestamp,
                    module
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Count records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count(&self, filter: &LogFilter) -> Result<u64, StoreError> {
        let (where_sql, params) = filter.to_sql();

        self.with_connection(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM request_logs{where_sql}");
            let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
        .await
    }

    /// One page of records matching `filter`, most recently inserted first.
    ///
    /// `page` starts at 1. Page 0, a zero page size, or a page past the end
    /// all yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn query(
        &self,
        filter: &LogFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        if page == 0 || page_size == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::from(page_size);
        // No table holds this many rows.
        let Some(offset) = i64::from(page - 1).checked_mul(limit) else {
            return Ok(Vec::new());
        };
        let (where_sql, mut params) = filter.to_sql();
        params.push(limit.into());
        params.push(offset.into());

        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM request_logs{where_sql} ORDER BY id DESC LIMIT ? OFFSET ?"
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(params), row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    /// Look up a single record by correlation id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails. A missing record is `Ok(None)`.
    pub async fn get_by_correlation_id(
        &self,
        id: &str,
    ) -> Result<Option<AuditRecord>, StoreError> {
        let id = id.to_string();

        self.with_connection(move |conn| {
            let sql = format!("SELECT {RECORD_COLUMNS} FROM request_logs WHERE request_id = ?1");
            let record = conn.query_row(&sql, params![id], row_to_record).optional()?;
            Ok(record)
        })
        .await
    }

    /// Every non-empty unit name that appears in the log, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_distinct_units(&self) -> Result<Vec<String>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT module FROM request_logs
                 WHERE module IS NOT NULL AND module != '' ORDER BY module",
            )?;
            let units = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(units)
        })
        .await
    }
}

fn encode<T: Serialize + ?Sized>(field: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { field, source })
}

fn decode_fields(raw: Option<String>) -> FieldMap {
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

fn decode_value(raw: Option<String>) -> Option<serde_json::Value> {
    raw.map(|text| serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    let status_code: i64 = row.get(9)?;
    Ok(AuditRecord {
        id: Some(row.get(0)?),
        correlation_id: CorrelationId::from(row.get::<_, String>(1)?),
        method: row.get(2)?,
        url: row.get(3)?,
        client_ip: row.get(4)?,
        request_headers: decode_fields(row.get(5)?),
        request_args: decode_fields(row.get(6)?),
        request_form: decode_fields(row.get(7)?),
        request_json: decode_value(row.get(8)?),
        status_code: u16::try_from(status_code).unwrap_or_default(),
        response_headers: decode_fields(row.get(10)?),
        response_data: decode_value(row.get(11)?),
        duration_ms: row.get(12)?,
        timestamp: row.get(13)?,
        unit: row.get(14)?,
    })
}
