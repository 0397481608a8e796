use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::error::{NamingError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_id")]
    pub id: String,
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    #[serde(default = "default_group")]
    pub default_group: String,
    #[serde(default)]
    pub bus: BusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of each worker's queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_id() -> String {
    "naming-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_namespace() -> String {
    "public".to_string()
}

fn default_group() -> String {
    "DEFAULT_GROUP".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    16 * 1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            log_level: default_log_level(),
            default_namespace: default_namespace(),
            default_group: default_group(),
            bus: BusConfig::default(),
        }
    }
}

impl NamingConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, NamingError> {
        let content = fs::read_to_string(path)
            .map_err(|e| NamingError::new(ErrorCode::ConfigInvalid, format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, NamingError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NamingError::new(ErrorCode::ConfigInvalid, format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), NamingError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NamingError::new(ErrorCode::ConfigInvalid, format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| NamingError::new(ErrorCode::ConfigInvalid, format!("Failed to write config file: {}", e)))
    }

    pub fn validate(&self) -> Result<(), NamingError> {
        if self.bus.workers == 0 {
            return Err(NamingError::new(ErrorCode::ConfigInvalid, "bus.workers must be at least 1"));
        }
        if self.bus.queue_capacity == 0 {
            return Err(NamingError::new(ErrorCode::ConfigInvalid, "bus.queue_capacity must be at least 1"));
        }
        if self.default_namespace.is_empty() || self.default_group.is_empty() {
            return Err(NamingError::new(ErrorCode::ConfigInvalid, "default namespace and group must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = NamingConfig::from_toml_str("").unwrap();
        assert_eq!(config, NamingConfig::default());
        assert_eq!(config.default_namespace, "public");
        assert_eq!(config.default_group, "DEFAULT_GROUP");
    }

    #[test]
    fn partial_bus_table_keeps_other_defaults() {
        let config = NamingConfig::from_toml_str("id = \"n2\"\n[bus]\nworkers = 8\n").unwrap();
        assert_eq!(config.id, "n2");
        assert_eq!(config.bus.workers, 8);
        assert_eq!(config.bus.queue_capacity, 16 * 1024);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = NamingConfig::from_toml_str("[bus]\nworkers = 0\n").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConfigInvalid));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("namingindex-config-{}.toml", std::process::id()));
        let mut config = NamingConfig::default();
        config.id = "written".to_string();

        config.to_toml_file(&path).unwrap();
        let loaded = NamingConfig::from_toml_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
