//! Scheme-keyed registry of file system backends

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use url::Url;

use crate::FileSystem;
#[cfg(feature = "local")]
use crate::{LocalFileSystem, Result, UrlfsConfig};

/// Shared handle to a registry
pub type RegistryHandle = Arc<Registry>;

/// Thread-safe mapping from URL scheme to file system backend
///
/// Backends register themselves under a scheme; the dispatch methods
/// (see [`crate::dispatch`]) route each URL to the backend registered for its
/// scheme. Schemes are case-insensitive. Registration and lookup may happen
/// concurrently from any number of threads.
#[derive(Default)]
pub struct Registry {
    filesystems: DashMap<String, Arc<dyn FileSystem>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            filesystems: DashMap::new(),
        }
    }

    /// Register `fs` for every URL whose scheme is `scheme`
    ///
    /// A backend already registered under the scheme is replaced and
    /// returned. Callers still holding it keep a working handle but receive
    /// no notification.
    pub fn register(
        &self,
        scheme: impl Into<String>,
        fs: Arc<dyn FileSystem>,
    ) -> Option<Arc<dyn FileSystem>> {
        let scheme = scheme.into().to_ascii_lowercase();
        info!(scheme = %scheme, backend = ?fs, "Registering file system");
        self.filesystems.insert(scheme, fs)
    }

    /// The backend that would handle `url`, if any
    pub fn lookup(&self, url: &Url) -> Option<Arc<dyn FileSystem>> {
        // `Url` keeps schemes lowercase already
        self.filesystems
            .get(url.scheme())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns true if a backend is registered for `scheme`
    pub fn has(&self, scheme: &str) -> bool {
        self.filesystems
            .contains_key(scheme.to_ascii_lowercase().as_str())
    }

    /// All registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .filesystems
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        schemes.sort();
        schemes
    }

    pub fn len(&self) -> usize {
        self.filesystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filesystems.is_empty()
    }
}

#[cfg(feature = "local")]
impl Registry {
    /// Build a registry holding the backends enabled in `config`
    pub fn from_config(config: &UrlfsConfig) -> Result<Self> {
        config.validate()?;
        let registry = Self::new();
        if config.local.enabled {
            registry.register(
                config.local.scheme.as_str(),
                Arc::new(LocalFileSystem::from_config(&config.local)),
            );
        }
        Ok(registry)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
