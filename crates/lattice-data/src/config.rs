//! Container configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```
//! use lattice_data::{ContainerConfig, NullOrdering};
//!
//! let config = ContainerConfig::from_toml_str(r#"
//!     first_generated_id = 100
//!     null_ordering = "last"
//! "#).unwrap();
//!
//! assert_eq!(config.first_generated_id, 100);
//! assert_eq!(config.null_ordering, NullOrdering::Last);
//! assert!(config.enforce_read_only);
//! ```

use std::path::Path;

use lattice_data_core::logging::targets;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where absent (null) values sort relative to present ones.
///
/// The ordering applies to ascending sorts; descending sorts reverse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrdering {
    /// Null sorts before every value.
    #[default]
    First,
    /// Null sorts after every value.
    Last,
}

/// Tunables for an [`IndexedContainer`](crate::IndexedContainer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// First candidate for auto-generated item ids.
    pub first_generated_id: i64,
    /// Reject writes to cells flagged read-only.
    pub enforce_read_only: bool,
    /// Null placement used by the default item sorter.
    pub null_ordering: NullOrdering,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            first_generated_id: 1,
            enforce_read_only: true,
            null_ordering: NullOrdering::First,
        }
    }
}

impl ContainerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            target: targets::CONFIG,
            path = %path.display(),
            ?config,
            "loaded container config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ContainerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_unknown_ordering_is_rejected() {
        let result = ContainerConfig::from_toml_str(r#"null_ordering = "middle""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enforce_read_only = false").unwrap();

        let config = ContainerConfig::load_toml(file.path()).unwrap();
        assert!(!config.enforce_read_only);
        assert_eq!(config.first_generated_id, 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContainerConfig::load_toml(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
