//! Bridge configuration (tether.toml)
//!
//! ```toml
//! [transport]
//! addr = "127.0.0.1:7447"
//! max_frame = 32768
//!
//! [discovery]
//! eager_depth = 1
//! walk_supertypes = true
//! max_supertypes = 16
//!
//! [log]
//! filter = "info"
//!
//! [[roots]]
//! name = "client"
//! type = "net.example.Client"
//! field = "INSTANCE"
//! default = true
//! ```
//!
//! Every section is optional.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryOptions;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "TETHER_CONFIG";

/// Config errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Listener settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Roots resolved through static fields
    #[serde(default)]
    pub roots: Vec<RootSpec>,
}

/// `[transport]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Listen / connect address
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Longest accepted request line, in bytes
    #[serde(default = "default_max_frame")]
    pub max_frame: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            max_frame: default_max_frame(),
        }
    }
}

/// `[discovery]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Levels of nested return types seeded eagerly
    #[serde(default = "default_eager_depth")]
    pub eager_depth: usize,

    /// Key inherited members under the concrete type
    #[serde(default = "default_true")]
    pub walk_supertypes: bool,

    /// Bound on supertypes walked per type
    #[serde(default = "default_max_supertypes")]
    pub max_supertypes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            eager_depth: default_eager_depth(),
            walk_supertypes: true,
            max_supertypes: default_max_supertypes(),
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Filter directive used when `TETHER_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// `[[roots]]`: a named root read from a static field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootSpec {
    /// Label used as the first instruction segment
    pub name: String,

    /// Fully qualified type declaring the field
    #[serde(rename = "type")]
    pub type_name: String,

    /// Static field holding the root object
    pub field: String,

    /// Whether unlabeled instructions start here
    #[serde(default)]
    pub default: bool,
}

fn default_addr() -> String {
    "127.0.0.1:7447".to_string()
}

fn default_max_frame() -> usize {
    32768
}

fn default_eager_depth() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_supertypes() -> usize {
    16
}

fn default_filter() -> String {
    "info".to_string()
}

impl BridgeConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `TETHER_CONFIG`, or defaults when unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.max_frame == 0 {
            return Err(ConfigError::Invalid(
                "transport.max_frame must be greater than zero".to_string(),
            ));
        }

        if self.transport.addr.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.addr cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for root in &self.roots {
            if root.name.is_empty() || root.type_name.is_empty() || root.field.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Root '{}' needs a name, a type, and a field",
                    root.name
                )));
            }
            if !seen.insert(root.name.as_str()) {
                return Err(ConfigError::Invalid(format!("Duplicate root name: {}", root.name)));
            }
        }

        if self.roots.iter().filter(|r| r.default).count() > 1 {
            return Err(ConfigError::Invalid(
                "At most one root can be the default".to_string(),
            ));
        }

        Ok(())
    }

    /// Discovery knobs for the engine
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            eager_depth: self.discovery.eager_depth,
            walk_supertypes: self.discovery.walk_supertypes,
            max_supertypes: self.discovery.max_supertypes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.transport.addr, "127.0.0.1:7447");
        assert_eq!(config.transport.max_frame, 32768);
        assert_eq!(config.discovery_options(), DiscoveryOptions::default());
        assert_eq!(config.log.filter, "info");
        assert!(config.roots.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[transport]
addr = "0.0.0.0:9000"
max_frame = 1024

[discovery]
eager_depth = 0
walk_supertypes = false

[log]
filter = "tether_engine=debug"

[[roots]]
name = "client"
type = "net.example.Client"
field = "INSTANCE"
default = true

[[roots]]
name = "world"
type = "net.example.World"
field = "CURRENT"
"#;
        let config = BridgeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.transport.addr, "0.0.0.0:9000");
        assert_eq!(config.transport.max_frame, 1024);
        assert_eq!(config.discovery.eager_depth, 0);
        assert!(!config.discovery.walk_supertypes);
        assert_eq!(config.discovery.max_supertypes, 16);
        assert_eq!(config.roots.len(), 2);
        assert_eq!(config.roots[0].type_name, "net.example.Client");
        assert!(config.roots[0].default);
        assert!(!config.roots[1].default);
    }

    #[test]
    fn test_zero_frame_rejected() {
        let err = BridgeConfig::from_toml_str("[transport]\nmax_frame = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_roots_rejected() {
        let toml = r#"
[[roots]]
name = "a"
type = "x.A"
field = "I"

[[roots]]
name = "a"
type = "x.B"
field = "I"
"#;
        assert!(matches!(
            BridgeConfig::from_toml_str(toml),
            Err(ConfigError::Invalid(msg)) if msg.contains("Duplicate")
        ));
    }

    #[test]
    fn test_two_defaults_rejected() {
        let toml = r#"
[[roots]]
name = "a"
type = "x.A"
field = "I"
default = true

[[roots]]
name = "b"
type = "x.B"
field = "I"
default = true
"#;
        assert!(BridgeConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[transport\naddr = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\naddr = \"127.0.0.1:1\"").unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.transport.addr, "127.0.0.1:1");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
