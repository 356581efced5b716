use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};
use crate::factory::{JsonDriverFactory, SharedDriverFactory};
use crate::memory::InMemoryDriver;
use crate::traits::DriverFactory;

/// Which storage backend owners are bound to.
///
/// Read from TOML:
///
/// ```toml
/// backend = "json"
/// data_path = "/var/lib/strata"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local tree, lost on exit.
    #[default]
    Memory,
    /// One JSON file per owner below `data_path`.
    Json { data_path: PathBuf },
}

impl BackendConfig {
    /// Parse a backend configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DriverResult<Self> {
        toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> DriverResult<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&text)
    }

    /// Build the driver factory this configuration describes.
    pub fn into_factory(self) -> Arc<dyn DriverFactory> {
        match self {
            BackendConfig::Memory => {
                Arc::new(SharedDriverFactory::new(Arc::new(InMemoryDriver::new())))
            }
            BackendConfig::Json { data_path } => Arc::new(JsonDriverFactory::new(data_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_memory() {
        assert_eq!(BackendConfig::default(), BackendConfig::Memory);
    }

    #[test]
    fn parse_json_backend() {
        let config =
            BackendConfig::from_toml_str("backend = \"json\"\ndata_path = \"/tmp/strata\"\n")
                .unwrap();
        assert_eq!(
            config,
            BackendConfig::Json {
                data_path: PathBuf::from("/tmp/strata")
            }
        );
    }

    #[test]
    fn parse_memory_backend() {
        let config = BackendConfig::from_toml_str("backend = \"memory\"").unwrap();
        assert_eq!(config, BackendConfig::Memory);
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = BackendConfig::from_toml_str("backend = \"mongo\"").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[tokio::test]
    async fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        tokio::fs::write(&path, "backend = \"memory\"\n").await.unwrap();
        assert_eq!(BackendConfig::load(&path).await.unwrap(), BackendConfig::Memory);
    }
}
