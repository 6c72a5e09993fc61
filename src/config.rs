//! Graph configuration.
//!
//! ```json
//! { "backend": { "kind": "memory" }, "type_deletion": "cascade", "seed_defaults": true }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for connecting to a storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

/// What happens to edges when a tenant deletes a relationship type they
/// still reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDeletionPolicy {
    /// Refuse with `Error::TypeInUse`.
    #[default]
    Block,
    /// Unlink every referencing pair in the same transaction.
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: BackendConfig,
    pub type_deletion: TypeDeletionPolicy,
    /// Insert the system relationship types when the graph is opened.
    pub seed_defaults: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            type_deletion: TypeDeletionPolicy::Block,
            seed_defaults: true,
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_type_deletion(mut self, policy: TypeDeletionPolicy) -> Self {
        self.type_deletion = policy;
        self
    }

    pub fn without_seed(mut self) -> Self {
        self.seed_defaults = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let cfg = GraphConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, GraphConfig::default());
        assert_eq!(cfg.type_deletion, TypeDeletionPolicy::Block);
        assert!(cfg.seed_defaults);
    }

    #[test]
    fn test_full_config() {
        let cfg = GraphConfig::from_json_str(
            r#"{ "backend": { "kind": "memory" }, "type_deletion": "cascade", "seed_defaults": false }"#,
        )
        .unwrap();
        assert_eq!(cfg.backend, BackendConfig::Memory);
        assert_eq!(cfg.type_deletion, TypeDeletionPolicy::Cascade);
        assert!(!cfg.seed_defaults);
    }

    #[test]
    fn test_unknown_policy_is_a_config_error() {
        let err = GraphConfig::from_json_str(r#"{ "type_deletion": "shrug" }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = GraphConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
