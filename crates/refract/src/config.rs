//! Runtime configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! [cache]
//! capacity = 256
//!
//! [permissions]
//! global = "ALL"
//!
//! [permissions.types]
//! "acme.Secret" = "PUBLIC_ONLY"
//! "plugins.*" = "READ_PUBLIC|INVOKE_PUBLIC"
//! ```
//!
//! Every section and key is optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::access::{PermissionStore, ReflectionPermission, TypePermissionRule};
use crate::cache::DEFAULT_CAPACITY;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML for this schema
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A permission string did not parse
    #[error("Invalid permission value for {key}: {value}")]
    InvalidPermission {
        /// `global` or the type pattern
        key: String,
        /// Offending text
        value: String,
    },

    /// Cache capacity must be positive
    #[error("Cache capacity must be at least 1")]
    InvalidCapacity,
}

/// `[cache]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of types with cached members
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// `[permissions]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Default for every type
    pub global: String,
    /// Type name or wildcard pattern to permission string
    pub types: BTreeMap<String, String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            global: "ALL".to_string(),
            types: BTreeMap::new(),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectConfig {
    /// Member cache settings
    pub cache: CacheConfig,
    /// Permission ceiling
    pub permissions: PermissionsConfig,
}

impl ReflectConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check capacity and every permission string
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        self.permission_store().map(|_| ())
    }

    /// Build the permission store described by `[permissions]`.
    ///
    /// Keys containing `*` become wildcard rules, tried in key order; the
    /// rest are exact overrides.
    pub fn permission_store(&self) -> Result<PermissionStore, ConfigError> {
        let parse = |key: &str, value: &str| {
            ReflectionPermission::from_combined_str(value).ok_or_else(|| {
                ConfigError::InvalidPermission {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            })
        };

        let mut store = PermissionStore::new();
        store.set_global(parse("global", &self.permissions.global)?);
        for (pattern, value) in &self.permissions.types {
            let perms = parse(pattern, value)?;
            if pattern.contains('*') {
                store.add_type_rule(TypePermissionRule::new(pattern.clone(), perms));
            } else {
                store
                    .set_type(pattern, perms)
                    .map_err(|_| ConfigError::InvalidPermission {
                        key: pattern.clone(),
                        value: value.clone(),
                    })?;
            }
        }
        Ok(store)
    }
}
