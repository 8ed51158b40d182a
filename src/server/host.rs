//! Host HTTP server: wires the store, registry and audit pipeline into axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use crate::api::{self, ApiState};
use crate::audit::{audit_requests, AuditPipeline};
use crate::config::{AppConfig, BASE_UNIT};
use crate::registry::{DiscoveryReport, UnitCatalog, UnitRegistry};
use crate::store::LogStore;

/// The host server with every feature unit mounted and auditing installed.
pub struct HostServer {
    config: AppConfig,
    registry: Arc<UnitRegistry>,
    pipeline: Arc<AuditPipeline>,
    router: Router,
    report: DiscoveryReport,
}

impl HostServer {
    /// Open the configured store, then assemble the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the log store cannot be opened.
    pub async fn build(config: AppConfig, catalog: UnitCatalog) -> Result<Self, ServerError> {
        let store = LogStore::open(&config.storage.path, config.storage.pool_max_idle).await?;
        tracing::info!(path = %store.path().display(), "Opened request log store");
        Ok(Self::with_store(config, catalog, store))
    }

    /// Assemble the server over an already opened store.
    ///
    /// Mounts the query API as unit `base`, then discovers `catalog`. Unit
    /// failures are logged and reported, never fatal.
    #[must_use]
    pub fn with_store(config: AppConfig, mut catalog: UnitCatalog, store: LogStore) -> Self {
        catalog.disable(&config.units.disabled);
        let registry = Arc::new(UnitRegistry::new(catalog));
        let pipeline = Arc::new(
            AuditPipeline::new(store, Arc::clone(&registry))
                .with_excluded(config.audit.excluded_units.iter().cloned())
                .with_max_body_bytes(config.audit.max_body_bytes),
        );

        let mut router = Router::new();
        let api_routes = api::routes(ApiState::new(
            Arc::clone(&pipeline),
            Arc::clone(&registry),
        ));
        registry.register_manually(&mut router, BASE_UNIT, api_routes);

        let report = registry.discover(&mut router);
        log_startup_report(&registry, &report);

        Self {
            config,
            registry,
            pipeline,
            router,
            report,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<AuditPipeline> {
        &self.pipeline
    }

    /// Outcome of the startup discovery pass.
    #[must_use]
    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.config.server.addr()
    }

    /// Build the final router with the audit, trace and CORS layers.
    pub fn into_router(self) -> Router {
        self.router
            .layer(axum::middleware::from_fn_with_state(
                self.pipeline,
                audit_requests,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Serve until `cancel` is triggered, then shut down gracefully.
    ///
    /// Audit records still being written are drained before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let addr = self.addr();
        let pipeline = Arc::clone(&self.pipeline);
        let app = self.into_router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(address = %addr, "Starting http-auditor");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("Server shutting down gracefully");
        })
        .await
        .map_err(ServerError::Serve)?;

        let pending = pipeline.pending_writes();
        if pending > 0 {
            tracing::info!(pending, "Waiting for audit records to be written");
        }
        pipeline.flush().await;
        Ok(())
    }
}

fn log_startup_report(registry: &UnitRegistry, report: &DiscoveryReport) {
    let mounted = registry.list_mounted();
    for name in &report.loaded {
        if let Some(unit) = mounted.get(name) {
            tracing::info!(
                unit = %unit.name,
                prefix = %unit.prefix,
                routes = unit.routes.len(),
                version = unit.version.as_deref().unwrap_or("-"),
                "Feature unit ready"
            );
        }
    }
    for (name, err) in &report.failed {
        tracing::warn!(unit = %name, error = %err, "Feature unit unavailable");
    }
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "Unit discovery finished"
    );
}
