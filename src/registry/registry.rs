//! Registry of mounted feature units.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use axum::Router;
use serde::Serialize;

use std::panic::AssertUnwindSafe;

use super::error::ModuleLoadError;
use super::unit::{catch_panic, FactoryError, RouteSet, UnitCatalog, UnitRegistration};

/// Something feature-unit routes can be nested into.
pub trait RouteHost {
    /// Nest `router` under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns the reason the host refused the routes. The host is left as it
    /// was before the call.
    fn attach(&mut self, prefix: &str, router: Router) -> Result<(), String>;
}

impl RouteHost for Router {
    fn attach(&mut self, prefix: &str, router: Router) -> Result<(), String> {
        let host = self.clone();
        *self = catch_panic(AssertUnwindSafe(|| host.nest(prefix, router)))?;
        Ok(())
    }
}

/// Read-only view of a mounted unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedUnit {
    pub name: String,
    pub prefix: String,
    /// Declared routes, relative to the prefix.
    pub routes: Vec<String>,
    pub version: Option<String>,
    pub enabled: bool,
}

/// Outcome of a successful mount request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// Routes were nested into the host.
    Mounted,
    /// The name was already mounted; nothing changed.
    AlreadyMounted,
}

/// Result of one discovery pass over the catalog.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Units mounted by this pass or an earlier one.
    pub loaded: Vec<String>,
    /// Units whose mount failed, with the reason.
    pub failed: Vec<(String, ModuleLoadError)>,
    /// Disabled registrations that were not attempted.
    pub skipped: Vec<String>,
}

impl DiscoveryReport {
    /// Every unit name a mount was attempted for.
    #[must_use]
    pub fn attempted(&self) -> Vec<&str> {
        self.loaded
            .iter()
            .map(String::as_str)
            .chain(self.failed.iter().map(|(name, _)| name.as_str()))
            .collect()
    }
}

/// Tracks which units are mounted and under which prefixes.
///
/// Units can be added but never removed.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    catalog: UnitCatalog,
    mounted: RwLock<BTreeMap<String, MountedUnit>>,
}

impl UnitRegistry {
    /// Create a registry over `catalog`.
    #[must_use]
    pub fn new(catalog: UnitCatalog) -> Self {
        Self {
            catalog,
            mounted: RwLock::new(BTreeMap::new()),
        }
    }

    /// The registration table this registry discovers from.
    #[must_use]
    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Attempt to mount every enabled registration not yet mounted.
    ///
    /// Failures are logged and reported; they never abort the pass.
    pub fn discover(&self, host: &mut impl RouteHost) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for registration in self.catalog.iter() {
            if !registration.enabled {
                tracing::debug!(unit = %registration.name, "Skipping disabled unit");
                report.skipped.push(registration.name.clone());
                continue;
            }

            match self.mount_registration(host, registration) {
                Ok(_) => report.loaded.push(registration.name.clone()),
                Err(err) => {
                    tracing::warn!(unit = %registration.name, error = %err, "Failed to mount unit");
                    report.failed.push((registration.name.clone(), err));
                }
            }
        }

        report
    }

    /// Mount one unit from the catalog by name.
    ///
    /// Returns `true` if the unit is mounted afterwards, including when it
    /// already was. Failures are logged, never raised.
    pub fn mount(&self, host: &mut impl RouteHost, name: &str) -> bool {
        match self.try_mount(host, name) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(unit = %name, error = %err, "Failed to mount unit");
                false
            }
        }
    }

    /// Mount one unit from the catalog, reporting why it failed.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleLoadError`] if the unit is unknown, disabled, fails
    /// to construct, exposes no routes, or its prefix cannot be mounted.
    pub fn try_mount(
        &self,
        host: &mut impl RouteHost,
        name: &str,
    ) -> Result<MountOutcome, ModuleLoadError> {
        let registration = self
            .catalog
            .get(name)
            .ok_or_else(|| ModuleLoadError::UnknownUnit(name.to_string()))?;
        self.mount_registration(host, registration)
    }

    fn mount_registration(
        &self,
        host: &mut impl RouteHost,
        registration: &UnitRegistration,
    ) -> Result<MountOutcome, ModuleLoadError> {
        let name = registration.name.as_str();
        if self.is_mounted(name) {
            return Ok(MountOutcome::AlreadyMounted);
        }
        if !registration.enabled {
            return Err(ModuleLoadError::Disabled(name.to_string()));
        }

        let factory_failed = |source: FactoryError| ModuleLoadError::Factory {
            name: name.to_string(),
            source,
        };
        let unit = catch_panic(registration.factory)
            .map_err(|panic| factory_failed(panic.into()))?
            .map_err(factory_failed)?;
        let routes = catch_panic(AssertUnwindSafe(|| {
            unit.routes().or_else(|| unit.nested_routes())
        }))
        .map_err(|panic| factory_failed(panic.into()))?
        .ok_or_else(|| ModuleLoadError::NoRoutes(name.to_string()))?;

        self.attach(host, name, routes, Some(registration.version.clone()))
    }

    /// Mount a route set that is not in the catalog.
    ///
    /// Re-registering a mounted name is a no-op. Returns `true` if the name is
    /// mounted afterwards.
    pub fn register_manually(
        &self,
        host: &mut impl RouteHost,
        name: &str,
        routes: RouteSet,
    ) -> bool {
        match self.attach(host, name, routes, None) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(unit = %name, error = %err, "Failed to register unit");
                false
            }
        }
    }

    fn attach(
        &self,
        host: &mut impl RouteHost,
        name: &str,
        routes: RouteSet,
        version: Option<String>,
    ) -> Result<MountOutcome, ModuleLoadError> {
        if !is_valid_prefix(routes.prefix()) {
            return Err(ModuleLoadError::InvalidPrefix {
                name: name.to_string(),
                prefix: routes.prefix().to_string(),
            });
        }
        let (prefix, router, declared) =
            routes.into_parts().map_err(|err| ModuleLoadError::InvalidRoute {
                name: name.to_string(),
                path: err.path,
                reason: err.reason,
            })?;

        let mut mounted = self.mounted.write().unwrap_or_else(PoisonError::into_inner);
        if mounted.contains_key(name) {
            return Ok(MountOutcome::AlreadyMounted);
        }
        if let Some(existing) = mounted
            .values()
            .find(|unit| prefixes_overlap(&unit.prefix, &prefix))
        {
            return Err(ModuleLoadError::PrefixCollision {
                name: name.to_string(),
                prefix,
                existing: existing.name.clone(),
            });
        }

        host.attach(&prefix, router)
            .map_err(|reason| ModuleLoadError::Attach {
                name: name.to_string(),
                prefix: prefix.clone(),
                reason,
            })?;
        mounted.insert(
            name.to_string(),
            MountedUnit {
                name: name.to_string(),
                prefix: prefix.clone(),
                routes: declared,
                version,
                enabled: true,
            },
        );
        drop(mounted);

        tracing::info!(unit = %name, prefix = %prefix, "Mounted feature unit");
        Ok(MountOutcome::Mounted)
    }

    /// Whether `name` is mounted.
    #[must_use]
    pub fn is_mounted(&self, name: &str) -> bool {
        self.mounted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Snapshot of every mounted unit, keyed by name.
    #[must_use]
    pub fn list_mounted(&self) -> BTreeMap<String, MountedUnit> {
        self.mounted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Name of the mounted unit whose prefix owns `path`, if any.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<String> {
        self.mounted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|unit| path_in_prefix(path, &unit.prefix))
            .max_by_key(|unit| unit.prefix.len())
            .map(|unit| unit.name.clone())
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() > 1
        && prefix.starts_with('/')
        && !prefix.ends_with('/')
        && !prefix.contains("//")
        && !prefix.contains([':', '*', '{', '}'])
}

fn path_in_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn prefixes_overlap(a: &str, b: &str) -> bool {
    path_in_prefix(a, b) || path_in_prefix(b, a)
}
