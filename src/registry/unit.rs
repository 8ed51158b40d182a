//! Feature unit definitions and the startup registration table.

use std::panic::{self, AssertUnwindSafe, UnwindSafe};

use axum::routing::MethodRouter;
use axum::Router;

/// Error type returned by unit constructors.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Constructor for a feature unit.
pub type UnitFactory = fn() -> Result<Box<dyn FeatureUnit>, FactoryError>;

/// Handler bindings under a common path prefix.
///
/// Bindings are kept as declared and only turned into a router when the
/// registry mounts the set, so a bad path surfaces as a load failure.
pub struct RouteSet {
    prefix: String,
    bindings: Vec<(String, MethodRouter)>,
    routes: Vec<String>,
}

/// A binding that axum refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteError {
    pub path: String,
    pub reason: String,
}

impl RouteSet {
    /// Start an empty route set mounted at `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            bindings: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Bind `method_router` at `path`, relative to the prefix.
    ///
    /// The same path may be bound more than once with different methods.
    #[must_use]
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        if !self.routes.iter().any(|p| p == path) {
            self.routes.push(path.to_string());
        }
        self.bindings.push((path.to_string(), method_router));
        self
    }

    /// Path prefix the set is mounted under.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Declared route paths, relative to the prefix.
    #[must_use]
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Build the router, stopping at the first binding axum rejects.
    pub(crate) fn into_parts(self) -> Result<(String, Router, Vec<String>), RouteError> {
        let mut router = Router::new();
        for (path, method_router) in self.bindings {
            if !path.starts_with('/') {
                return Err(RouteError {
                    path,
                    reason: "path must start with '/'".to_string(),
                });
            }
            router = catch_panic(AssertUnwindSafe(|| router.route(&path, method_router)))
                .map_err(|reason| RouteError { path, reason })?;
        }
        Ok((self.prefix, router, self.routes))
    }
}

/// Run `f`, turning a panic into its message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T + UnwindSafe) -> Result<T, String> {
    panic::catch_unwind(f).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

impl std::fmt::Debug for RouteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSet")
            .field("prefix", &self.prefix)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// An independently mountable feature module.
///
/// A unit exposes its routes in one of two forms. The registry checks
/// [`routes`](Self::routes) first and falls back to
/// [`nested_routes`](Self::nested_routes).
pub trait FeatureUnit: Send + Sync {
    /// Route set exposed directly by the unit.
    fn routes(&self) -> Option<RouteSet> {
        None
    }

    /// Route set exposed through the unit's routing sub-definition.
    fn nested_routes(&self) -> Option<RouteSet> {
        None
    }
}

/// One entry of the registration table.
#[derive(Debug, Clone)]
pub struct UnitRegistration {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Disabled registrations are skipped by discovery.
    pub enabled: bool,
    pub factory: UnitFactory,
}

impl UnitRegistration {
    /// Create an enabled registration.
    #[must_use]
    pub fn new(name: impl Into<String>, factory: UnitFactory) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            description: String::new(),
            enabled: true,
            factory,
        }
    }

    /// Set the version (builder pattern).
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the description (builder pattern).
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the enabled flag (builder pattern).
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// The set of units known at startup, in registration order.
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    registrations: Vec<UnitRegistration>,
}

impl UnitCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration. A later registration replaces one with the same name.
    pub fn register(&mut self, registration: UnitRegistration) {
        match self
            .registrations
            .iter_mut()
            .find(|r| r.name == registration.name)
        {
            Some(existing) => *existing = registration,
            None => self.registrations.push(registration),
        }
    }

    /// Add a registration (builder pattern).
    #[must_use]
    pub fn with(mut self, registration: UnitRegistration) -> Self {
        self.register(registration);
        self
    }

    /// Mark the named registrations disabled.
    pub fn disable<S: AsRef<str>>(&mut self, names: &[S]) {
        for registration in &mut self.registrations {
            if names.iter().any(|n| n.as_ref() == registration.name) {
                registration.enabled = false;
            }
        }
    }

    /// Look up a registration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UnitRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    /// Iterate registrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitRegistration> {
        self.registrations.iter()
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::{get, post};

    use super::*;

    struct Empty;
    impl FeatureUnit for Empty {}

    fn empty_factory() -> Result<Box<dyn FeatureUnit>, FactoryError> {
        Ok(Box::new(Empty))
    }

    #[test]
    fn test_route_set_records_paths() {
        let routes = RouteSet::new("/shop")
            .route("/", get(|| async { "index" }))
            .route("/items", get(|| async { "items" }));

        assert_eq!(routes.prefix(), "/shop");
        assert_eq!(routes.routes(), ["/".to_string(), "/items".to_string()]);
    }

    #[test]
    fn test_same_path_with_other_method_merges() {
        let routes = RouteSet::new("/shop")
            .route("/items", get(|| async { "list" }))
            .route("/items", post(|| async { "create" }));

        assert_eq!(routes.routes(), ["/items".to_string()]);
        assert!(routes.into_parts().is_ok());
    }

    #[test]
    fn test_duplicate_binding_is_an_error() {
        let routes = RouteSet::new("/shop")
            .route("/items", get(|| async { "a" }))
            .route("/items", get(|| async { "b" }));

        let err = routes.into_parts().unwrap_err();
        assert_eq!(err.path, "/items");
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_relative_path_is_an_error() {
        let err = RouteSet::new("/shop")
            .route("items", get(|| async { "a" }))
            .into_parts()
            .unwrap_err();
        assert_eq!(err.path, "items");
    }

    #[test]
    fn test_catch_panic_message() {
        assert_eq!(catch_panic(|| 7), Ok(7));
        assert_eq!(catch_panic(|| -> u8 { panic!("boom") }), Err("boom".to_string()));
        let owned = catch_panic(|| -> u8 { panic!("code {}", 7) });
        assert_eq!(owned, Err("code 7".to_string()));
    }

    #[test]
    fn test_unit_defaults_expose_nothing() {
        let unit = Empty;
        assert!(unit.routes().is_none());
        assert!(unit.nested_routes().is_none());
    }

    #[test]
    fn test_catalog_register_replaces_by_name() {
        let mut catalog = UnitCatalog::new();
        catalog.register(UnitRegistration::new("shop", empty_factory).version("1.0.0"));
        catalog.register(UnitRegistration::new("shop", empty_factory).version("2.0.0"));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("shop").unwrap().version, "2.0.0");
    }

    #[test]
    fn test_catalog_disable() {
        let mut catalog = UnitCatalog::new()
            .with(UnitRegistration::new("a", empty_factory))
            .with(UnitRegistration::new("b", empty_factory));
        catalog.disable(&["b"]);

        assert!(catalog.get("a").unwrap().enabled);
        assert!(!catalog.get("b").unwrap().enabled);
        let names: Vec<_> = catalog.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
