//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Environment variable naming a config file that replaces the search paths.
pub const CONFIG_ENV: &str = "HTTP_AUDITOR_CONFIG";

/// Where the loader looks for its file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    /// First existing file wins; none at all means defaults.
    Search(Vec<PathBuf>),
    /// Named by the operator, so it has to exist.
    Explicit(PathBuf),
}

/// Locates and parses the server configuration.
#[derive(Debug)]
pub struct ConfigLoader {
    source: ConfigSource,
}

impl ConfigLoader {
    /// Loader honouring [`CONFIG_ENV`], falling back to the default search paths.
    #[must_use]
    pub fn new() -> Self {
        Self::from_env(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    fn from_env(value: Option<PathBuf>) -> Self {
        match value.filter(|path| !path.as_os_str().is_empty()) {
            Some(path) => Self::with_path(path),
            None => Self::search(default_search_paths()),
        }
    }

    /// Loader for a file the operator named; a missing file is an error.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: ConfigSource::Explicit(path),
        }
    }

    fn search(paths: Vec<PathBuf>) -> Self {
        Self {
            source: ConfigSource::Search(paths),
        }
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file is missing, or if the
    /// chosen file cannot be read or parsed.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if let ConfigSource::Explicit(path) = &self.source {
            if !path.exists() {
                return Err(ConfigError::Missing { path: path.clone() });
            }
        }

        match self.find_config_file() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::load_from_path(&path)
            }
            None => {
                tracing::debug!(
                    searched = self.search_paths().len(),
                    "No config file found, using defaults"
                );
                Ok(AppConfig::default())
            }
        }
    }

    fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate files, in priority order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        match &self.source {
            ConfigSource::Search(paths) => paths,
            ConfigSource::Explicit(path) => std::slice::from_ref(path),
        }
    }

    /// First candidate file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths().iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// `./.http-auditor.toml`, then `<config dir>/http-auditor/config.toml`.
fn default_search_paths() -> Vec<PathBuf> {
    std::iter::once(PathBuf::from(".http-auditor.toml"))
        .chain(dirs::config_dir().map(|dir| dir.join("http-auditor").join("config.toml")))
        .collect()
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file {path} does not exist")]
    Missing { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
