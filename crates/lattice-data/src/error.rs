//! Error types for Lattice Data.

use std::path::PathBuf;

use crate::container::{ItemId, PropertyId, ValueType};

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised by container operations.
///
/// Precondition failures such as adding a duplicate item id are not errors;
/// those operations report failure through their `bool` / `Option` return.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The item does not exist in the container.
    #[error("item '{0}' does not exist")]
    ItemNotFound(ItemId),

    /// The property is not registered in the schema.
    #[error("property '{0}' is not registered")]
    PropertyNotFound(PropertyId),

    /// A value's kind is not accepted by the property's declared type.
    #[error(
        "value is of invalid type for property '{property}', \
         got {found} but {expected} was expected"
    )]
    TypeMismatch {
        property: PropertyId,
        expected: ValueType,
        found: ValueType,
    },

    /// The cell has been flagged read-only.
    #[error("property '{property}' of item '{item}' is read-only")]
    ReadOnly { item: ItemId, property: PropertyId },

    /// The filter cannot be evaluated by the in-memory engine.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// The operation is never permitted on this object.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// `sort` received a different number of property ids and direction flags.
    #[error("sort received {properties} property ids but {directions} direction flags")]
    SortLengthMismatch { properties: usize, directions: usize },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ContainerError {
    /// Create a type mismatch error.
    pub fn type_mismatch(
        property: impl Into<PropertyId>,
        expected: ValueType,
        found: ValueType,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected,
            found,
        }
    }

    /// Create an unsupported filter error.
    pub fn unsupported_filter(message: impl Into<String>) -> Self {
        Self::UnsupportedFilter(message.into())
    }
}

/// Errors that can occur while loading a [`ContainerConfig`](crate::ContainerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read container config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("invalid container config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
