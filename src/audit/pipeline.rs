//! Per-request audit lifecycle: start, end and teardown hooks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio_util::task::TaskTracker;

use super::capture::{RequestView, ResponseView};
use super::record::{AuditRecord, CorrelationId};
use crate::registry::UnitRegistry;
use crate::store::LogStore;

/// Default cap on captured request and response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// A tracked request that has started but not yet ended.
#[derive(Debug)]
struct OpenEntry {
    started: Instant,
    timestamp: f64,
    unit: Option<String>,
}

#[derive(Debug, Default)]
struct InFlight {
    entries: HashMap<CorrelationId, OpenEntry>,
    last_timestamp: f64,
}

/// Turns request/response pairs into persisted audit records.
///
/// Every hook is infallible from the caller's point of view: problems are
/// logged and the request carries on unaffected. Records are written by
/// background tasks, so a slow or locked store never holds up a response.
#[derive(Debug)]
pub struct AuditPipeline {
    store: LogStore,
    registry: Arc<UnitRegistry>,
    excluded: HashSet<String>,
    max_body_bytes: usize,
    in_flight: Mutex<InFlight>,
    writes: TaskTracker,
}

impl AuditPipeline {
    /// Create a pipeline writing to `store` and classifying via `registry`.
    #[must_use]
    pub fn new(store: LogStore, registry: Arc<UnitRegistry>) -> Self {
        Self {
            store,
            registry,
            excluded: HashSet::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            in_flight: Mutex::new(InFlight::default()),
            writes: TaskTracker::new(),
        }
    }

    /// Units whose requests are never tracked.
    #[must_use]
    pub fn with_excluded<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = units.into_iter().map(Into::into).collect();
        self
    }

    /// Largest body, in bytes, that is buffered for the record.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    #[must_use]
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Number of requests started but not yet ended or torn down.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().entries.len()
    }

    /// Records handed to the store but not yet written.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Wait until every record handed off so far has been written or dropped.
    ///
    /// Concurrent flushes are not supported.
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// Mounted unit that owns `path`; `None` for host-native routes.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<String> {
        self.registry.resolve(path)
    }

    /// Whether requests destined for `unit` are excluded from auditing.
    #[must_use]
    pub fn is_excluded(&self, unit: Option<&str>) -> bool {
        unit.is_some_and(|name| self.excluded.contains(name))
    }

    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin tracking a request bound for `unit`.
    ///
    /// Returns `None` when the unit is excluded; the request is then not
    /// tracked and the other hooks must not be called for it.
    pub fn on_request_start(&self, unit: Option<&str>) -> Option<CorrelationId> {
        if self.is_excluded(unit) {
            return None;
        }

        let id = CorrelationId::generate();
        let mut in_flight = self.lock();
        // Wall clocks can step backwards; arrival times must not.
        let timestamp = wall_clock_secs().max(in_flight.last_timestamp);
        in_flight.last_timestamp = timestamp;
        in_flight.entries.insert(
            id.clone(),
            OpenEntry {
                started: Instant::now(),
                timestamp,
                unit: unit.map(str::to_string),
            },
        );
        Some(id)
    }

    /// Finish a tracked request and hand its record to the store.
    ///
    /// The write runs on a background task; see [`flush`](Self::flush).
    /// Returns `false` without doing anything when `id` is not open. Storage
    /// failures are logged by the store and never surface here.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_request_end(
        &self,
        id: &CorrelationId,
        request: &RequestView,
        response: &ResponseView,
    ) -> bool {
        let entry = self.lock().entries.remove(id);
        let Some(entry) = entry else {
            tracing::debug!(request_id = %id, "No open audit entry; skipping record");
            return false;
        };

        let record = build_record(id, entry, request, response);
        let store = self.store.clone();
        self.writes.spawn(async move {
            store.insert(&record).await;
        });
        true
    }

    /// Drop any open entry for `id`. Safe to call after `on_request_end`.
    pub fn on_request_teardown(&self, id: &CorrelationId) -> bool {
        let removed = self.lock().entries.remove(id).is_some();
        if removed {
            tracing::debug!(request_id = %id, "Discarded unfinished audit entry");
        }
        removed
    }
}

fn build_record(
    id: &CorrelationId,
    entry: OpenEntry,
    request: &RequestView,
    response: &ResponseView,
) -> AuditRecord {
    let elapsed_ms = entry.started.elapsed().as_secs_f64() * 1000.0;

    AuditRecord {
        id: None,
        correlation_id: id.clone(),
        method: request.method.clone(),
        url: request.path.clone(),
        client_ip: request.client_ip.clone(),
        request_headers: request.headers.clone(),
        request_args: request.query.clone(),
        request_form: request.form(),
        request_json: request.json(),
        status_code: response.status,
        response_headers: response.headers.clone(),
        response_data: response.data(),
        duration_ms: Some((elapsed_ms * 1000.0).round() / 1000.0),
        timestamp: entry.timestamp,
        unit: entry.unit,
    }
}

#[allow(clippy::cast_precision_loss)]
fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
