//! Database schema for the request log.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the request log database.
pub const SCHEMA: &str = r"
-- Enable WAL mode so readers do not block the audit writers
PRAGMA journal_mode = WAL;

-- One append-only row per completed request
CREATE TABLE IF NOT EXISTS request_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL UNIQUE,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    client_ip TEXT,
    request_headers TEXT NOT NULL,
    request_args TEXT NOT NULL,
    request_form TEXT NOT NULL,
    request_json TEXT,
    status_code INTEGER NOT NULL,
    response_headers TEXT NOT NULL,
    response_data TEXT,
    process_time REAL,
    timestamp REAL NOT NULL,
    module TEXT
);

-- Schema version table for migrations
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Indexes for the dashboard filters
CREATE INDEX IF NOT EXISTS idx_request_logs_timestamp ON request_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_request_logs_module ON request_logs(module);
CREATE INDEX IF NOT EXISTS idx_request_logs_status_code ON request_logs(status_code);
";

/// Columns selected when reading records back, in `row_to_record` order.
pub const RECORD_COLUMNS: &str = "id, request_id, method, url, client_ip, request_headers, \
     request_args, request_form, request_json, status_code, response_headers, response_data, \
     process_time, timestamp, module";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        assert!(table_exists(&conn, "request_logs"));
        assert!(table_exists(&conn, "schema_version"));
    }

    #[test]
    fn test_schema_creates_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let expected_indexes = [
            "idx_request_logs_timestamp",
            "idx_request_logs_module",
            "idx_request_logs_status_code",
        ];

        for index_name in expected_indexes {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?",
                    [index_name],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Index {index_name} should exist");
        }
    }

    #[test]
    fn test_request_id_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let insert = "INSERT INTO request_logs (request_id, method, url, request_headers, \
             request_args, request_form, status_code, response_headers, timestamp) \
             VALUES ('dup', 'GET', '/', '{}', '{}', '{}', 200, '{}', 1.0)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_record_columns_select() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let sql = format!("SELECT {RECORD_COLUMNS} FROM request_logs");
        let stmt = conn.prepare(&sql).unwrap();
        assert_eq!(stmt.column_count(), 15);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Apply schema twice - should not error due to IF NOT EXISTS
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        assert!(table_exists(&conn, "request_logs"));
    }
}
