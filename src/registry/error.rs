//! Module registry error types.

/// Reasons a feature unit could not be mounted.
///
/// These never stop the host: the registry logs them and carries on with the
/// units that did load.
#[derive(thiserror::Error, Debug)]
pub enum ModuleLoadError {
    /// No registration exists under this name.
    #[error("Unit {0} is not in the registration table")]
    UnknownUnit(String),

    /// The registration is marked disabled.
    #[error("Unit {0} is disabled")]
    Disabled(String),

    /// The unit's constructor failed.
    #[error("Unit {name} failed to load: {source}")]
    Factory {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The unit exposes neither a top-level nor a nested route set.
    #[error("Unit {0} exposes no route set")]
    NoRoutes(String),

    /// The route prefix cannot be nested into the host router.
    #[error("Unit {name} has invalid route prefix {prefix:?}")]
    InvalidPrefix { name: String, prefix: String },

    /// A route inside the unit's set cannot be bound.
    #[error("Unit {name} route {path} rejected: {reason}")]
    InvalidRoute {
        name: String,
        path: String,
        reason: String,
    },

    /// The host refused to nest the unit's routes.
    #[error("Unit {name} could not be attached at {prefix}: {reason}")]
    Attach {
        name: String,
        prefix: String,
        reason: String,
    },

    /// The route prefix overlaps one that is already mounted.
    #[error("Unit {name} prefix {prefix} collides with mounted unit {existing}")]
    PrefixCollision {
        name: String,
        prefix: String,
        existing: String,
    },
}
