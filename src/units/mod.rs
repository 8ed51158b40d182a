//! Built-in feature units and the startup registration table.

pub mod example;

use crate::registry::UnitCatalog;

/// Registration table of every unit compiled into the server.
#[must_use]
pub fn builtin_catalog() -> UnitCatalog {
    UnitCatalog::new().with(example::registration())
}
