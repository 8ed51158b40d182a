//! Registry that mounts feature units into the host router.

mod error;
#[allow(clippy::module_inception)]
mod registry;
mod unit;

pub use error::ModuleLoadError;
pub use registry::{DiscoveryReport, MountOutcome, MountedUnit, RouteHost, UnitRegistry};
pub use unit::{FactoryError, FeatureUnit, RouteSet, UnitCatalog, UnitFactory, UnitRegistration};
