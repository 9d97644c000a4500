//! Settings of the benchmark data layer.
//!
//! Stored as YAML under an `io` key:
//!
//! ```yaml
//! io:
//!   max_hops: 5
//!   absolute: true
//! ```

use crate::util::{self, DEFAULT_MAX_HOPS};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use yaml_rust::YamlLoader;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for ConfigError {
    fn from(err: yaml_rust::ScanError) -> Self {
        ConfigError::YamlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::YamlError(err.to_string())
    }
}

/// How relative data paths are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoConfig {
    /// Number of parent folders tried by [`util::update_path`].
    pub max_hops: usize,
    /// Return absolute paths from [`IoConfig::resolve`].
    pub absolute: bool,
}

#[derive(Serialize)]
struct IoConfigFile<'a> {
    io: &'a IoConfig,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            max_hops: DEFAULT_MAX_HOPS,
            absolute: true,
        }
    }
}

impl IoConfig {
    /// Load settings from a YAML file, missing keys keep their defaults.
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let docs = YamlLoader::load_from_str(contents)?;
        let mut config = IoConfig::default();
        let Some(doc) = docs.first() else {
            return Ok(config);
        };

        let io = &doc["io"];
        if io.is_badvalue() {
            return Ok(config);
        }
        if !io["max_hops"].is_badvalue() {
            let max_hops = io["max_hops"].as_i64().ok_or_else(|| {
                ConfigError::InvalidParams("Invalid max_hops: not an integer".to_string())
            })?;
            config.max_hops = usize::try_from(max_hops).map_err(|_| {
                ConfigError::InvalidParams(format!("Invalid max_hops: {max_hops}"))
            })?;
        }
        if !io["absolute"].is_badvalue() {
            config.absolute = io["absolute"].as_bool().ok_or_else(|| {
                ConfigError::InvalidParams("Invalid absolute: not a boolean".to_string())
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save settings as YAML.
    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        let yaml_string = serde_yaml::to_string(&IoConfigFile { io: self })?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hops == 0 {
            return Err(ConfigError::InvalidParams(
                "max_hops must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a data path with these settings, see [`util::update_path`].
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        util::update_path(path, self.max_hops, self.absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IoConfig::default();
        assert_eq!(config.max_hops, 5);
        assert!(config.absolute);
        assert_eq!(IoConfig::from_yaml_str("").unwrap(), config);
        assert_eq!(IoConfig::from_yaml_str("other: 1").unwrap(), config);
    }

    #[test]
    fn test_partial_yaml() {
        let config = IoConfig::from_yaml_str("io:\n  absolute: false\n").unwrap();
        assert_eq!(config.max_hops, 5);
        assert!(!config.absolute);
    }

    #[test]
    fn test_invalid_yaml_values() {
        assert!(matches!(
            IoConfig::from_yaml_str("io:\n  max_hops: 0\n"),
            Err(ConfigError::InvalidParams(_))
        ));
        assert!(matches!(
            IoConfig::from_yaml_str("io:\n  max_hops: -2\n"),
            Err(ConfigError::InvalidParams(_))
        ));
        assert!(matches!(
            IoConfig::from_yaml_str("io:\n  absolute: maybe\n"),
            Err(ConfigError::InvalidParams(_))
        ));
        assert!(matches!(
            IoConfig::from_yaml_str("io: [unclosed"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_save_load_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("io.yaml");
        let config = IoConfig {
            max_hops: 3,
            absolute: false,
        };
        config.save_to_yaml(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("max_hops: 3"));
        assert_eq!(IoConfig::load_from_yaml(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_uses_settings() {
        let config = IoConfig {
            max_hops: 2,
            absolute: false,
        };
        assert_eq!(config.resolve("Cargo.toml"), PathBuf::from("Cargo.toml"));
        assert_eq!(config.resolve("/tmp"), PathBuf::from("/tmp"));
    }
}
