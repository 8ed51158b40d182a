//! Application configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audit::DEFAULT_MAX_BODY_BYTES;
use crate::pool::DEFAULT_MAX_IDLE;
use crate::store::default_db_path;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;

/// Unit name of the host's own query API.
pub const BASE_UNIT: &str = "base";

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub audit: AuditConfig,
    pub units: UnitsConfig,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

/// Log store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file.
    pub path: PathBuf,
    /// Idle connections kept by the pool; extra handles are closed on release.
    pub pool_max_idle: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

/// Audit pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Units whose requests are never recorded.
    pub excluded_units: Vec<String>,
    /// Bodies larger than this are passed through without being recorded.
    pub max_body_bytes: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            excluded_units: vec![BASE_UNIT.to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Feature unit settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Registrations skipped during discovery.
    pub disabled: Vec<String>,
}
