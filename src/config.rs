//! Engine configuration.
//!
//! The store is constructed explicitly from an [`EngineConfig`] — there is no
//! process-wide default instance. Configuration can be loaded from and saved
//! to TOML files.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration file handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(onto::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(onto::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(onto::config::write),
        help("Check directory permissions and available disk space.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// How the instance manager treats property names that are not declared in
/// the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyPolicy {
    /// Silently skip unknown property names (logged at debug level).
    #[default]
    Lenient,
    /// Reject instance creation that names an undeclared property.
    Strict,
}

impl std::fmt::Display for PropertyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyPolicy::Lenient => write!(f, "lenient"),
            PropertyPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Configuration for the ontograph engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URI all default namespaces derive from. Must end with `/`.
    pub base_uri: String,
    /// Unknown-property handling on instance creation.
    #[serde(default)]
    pub property_policy: PropertyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://example.org/".into(),
            property_policy: PropertyPolicy::Lenient,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lenient() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.property_policy, PropertyPolicy::Lenient);
        assert!(cfg.base_uri.ends_with('/'));
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ontograph.toml");

        let cfg = EngineConfig {
            base_uri: "http://shop.example/".into(),
            property_policy: PropertyPolicy::Strict,
        };
        cfg.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.base_uri, "http://shop.example/");
        assert_eq!(loaded.property_policy, PropertyPolicy::Strict);
    }

    #[test]
    fn missing_policy_defaults_to_lenient() {
        let cfg: EngineConfig = toml::from_str("base_uri = \"http://x.example/\"").unwrap();
        assert_eq!(cfg.property_policy, PropertyPolicy::Lenient);
    }

    #[test]
    fn load_missing_file_errors() {
        let err = EngineConfig::load(std::path::Path::new("/nonexistent/onto.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
