use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "s3")]
use crate::S3Storage;
use crate::{FileSystemStorage, MemoryStorage, StorageCapability, StorageError};

/// The storage backends known to a [`StorageRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// [`MemoryStorage`]
    Memory,
    /// [`FileSystemStorage`]
    FileSystem,
    /// `S3Storage`, registered only with the `s3` feature.
    S3,
}

/// Configuration selecting and parameterizing a storage backend.
///
/// ```
/// use ferry_storage::{StorageKind, StorageSettings};
///
/// let settings: StorageSettings = serde_json::from_str(
///     r#"{ "kind": "file_system", "options": { "path": "/var/lib/ferry" } }"#,
/// ).unwrap();
/// assert_eq!(settings.kind, StorageKind::FileSystem);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Which backend to construct.
    pub kind: StorageKind,
    /// Backend specific options.
    #[serde(default)]
    pub options: Value,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            options: Value::Null,
        }
    }
}

/// Builds a backend from its options.
pub type StorageConstructor = fn(&Value) -> Result<Arc<dyn StorageCapability>, StorageError>;

/// Maps each [`StorageKind`] to the constructor that builds it.
///
/// [`StorageRegistry::default`] knows every backend in this crate;
/// [`StorageRegistry::register`] replaces or adds constructors.
#[derive(Clone)]
pub struct StorageRegistry {
    constructors: HashMap<StorageKind, StorageConstructor>,
}

impl StorageRegistry {
    /// A registry that knows no backends.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register `constructor` for `kind`, replacing any previous one.
    pub fn register(mut self, kind: StorageKind, constructor: StorageConstructor) -> Self {
        self.constructors.insert(kind, constructor);
        self
    }

    /// Construct the backend described by `settings`.
    pub fn build(
        &self,
        settings: &StorageSettings,
    ) -> Result<Arc<dyn StorageCapability>, StorageError> {
        let constructor = self.constructors.get(&settings.kind).ok_or_else(|| {
            StorageError::Configuration(format!(
                "No storage backend registered for {:?}",
                settings.kind
            ))
        })?;
        tracing::debug!(kind = ?settings.kind, "Constructing storage backend");
        constructor(&settings.options)
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        let registry = Self::empty()
            .register(StorageKind::Memory, |options| {
                Ok(Arc::new(MemoryStorage::from_options(parse_options(options)?)?))
            })
            .register(StorageKind::FileSystem, |options| {
                Ok(Arc::new(FileSystemStorage::from_options(parse_options(options)?)?))
            });

        #[cfg(feature = "s3")]
        let registry = registry.register(StorageKind::S3, |options| {
            Ok(Arc::new(S3Storage::from_options(parse_options(options)?)?))
        });

        registry
    }
}

impl Debug for StorageRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Deserialize backend options, treating absent options as an empty object.
pub fn parse_options<T: DeserializeOwned>(options: &Value) -> Result<T, StorageError> {
    let options = match options {
        Value::Null => Value::Object(Default::default()),
        options => options.clone(),
    };
    serde_json::from_value(options)
        .map_err(|error| StorageError::Configuration(format!("Invalid storage options: {error}")))
}
