//! Runtime source registry.
//!
//! Owns the set of registered sources, their enable/disable state and their
//! one-time initialization and disposal. The registry is the only shared
//! mutable state in the engine. Mutations ([`SourceRegistry::register`],
//! [`SourceRegistry::enable`] and friends) are serialized by a dedicated
//! mutation lock and run a source's async initialization without holding
//! the entry map's lock. The entry only becomes visible (or enabled) once
//! initialization has completed, so readers such as
//! [`SourceRegistry::get_all`] neither wait on a slow initialization nor
//! observe a half-initialized source.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use risk_radar_source_models::SourceDescriptor;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::{AlertSource, SourceError};

/// Errors returned by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A source with this id is already registered.
    #[error("Source already registered: {id}")]
    DuplicateSource {
        /// The conflicting id.
        id: String,
    },

    /// No source with this id is registered.
    #[error("Source not found: {id}")]
    SourceNotFound {
        /// The missing id.
        id: String,
    },

    /// The source failed its one-time initialization.
    #[error("Failed to initialize source {id}: {source}")]
    Initialization {
        /// The source that failed.
        id: String,
        /// The underlying failure.
        source: SourceError,
    },
}

struct RegistryEntry {
    source: Arc<dyn AlertSource>,
    config: Option<serde_json::Value>,
    enabled: bool,
    initialized: bool,
}

/// A snapshot of one registry entry, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSource {
    /// The source's static metadata.
    pub descriptor: SourceDescriptor,
    /// Whether the source participates in queries.
    pub enabled: bool,
    /// Whether the source's initialization has run.
    pub initialized: bool,
}

/// Registry of alert sources keyed by id.
#[derive(Default)]
pub struct SourceRegistry {
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
    mutations: Mutex<()>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source.
    ///
    /// When `enabled` is `true` the source is initialized before it becomes
    /// visible; if initialization fails nothing is registered. Disabled
    /// sources are initialized lazily on their first [`Self::enable`].
    ///
    /// # Errors
    ///
    /// * [`RegistryError::DuplicateSource`] if the id is already taken. The
    ///   existing registration is left untouched.
    /// * [`RegistryError::Initialization`] if initialization fails.
    pub async fn register(
        &self,
        source: Arc<dyn AlertSource>,
        config: Option<serde_json::Value>,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let id = source.id().to_string();
        let _mutation = self.mutations.lock().await;

        if self.entries.read().await.contains_key(&id) {
            return Err(RegistryError::DuplicateSource { id });
        }

        if enabled {
            source
                .initialize(config.as_ref())
                .await
                .map_err(|e| RegistryError::Initialization {
                    id: id.clone(),
                    source: e,
                })?;
        }

        let mut entries = self.entries.write().await;
        let Entry::Vacant(slot) = entries.entry(id.clone()) else {
            return Err(RegistryError::DuplicateSource { id });
        };

        log::info!(
            "Registered source {id} ({}){}",
            source.name(),
            if enabled { "" } else { " [disabled]" }
        );

        slot.insert(RegistryEntry {
            source,
            config,
            enabled,
            initialized: enabled,
        });

        Ok(())
    }

    /// Removes a source, disposing it first if it was initialized.
    ///
    /// Disposal failures are logged and swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SourceNotFound`] if the id is unknown.
    pub async fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        let _mutation = self.mutations.lock().await;
        let entry = self
            .entries
            .write()
            .await
            .remove(id)
            .ok_or_else(|| RegistryError::SourceNotFound { id: id.to_string() })?;

        if entry.initialized {
            dispose_quietly(entry.source.as_ref()).await;
        }

        log::info!("Unregistered source {id}");
        Ok(())
    }

    /// Enables a source, initializing it first if it never was.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::SourceNotFound`] if the id is unknown.
    /// * [`RegistryError::Initialization`] if lazy initialization fails. The
    ///   source stays disabled.
    pub async fn enable(&self, id: &str) -> Result<(), RegistryError> {
        let _mutation = self.mutations.lock().await;

        let (source, config, initialized) = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(id)
                .ok_or_else(|| RegistryError::SourceNotFound { id: id.to_string() })?;
            (Arc::clone(&entry.source), entry.config.clone(), entry.initialized)
        };

        if !initialized && let Err(e) = source.initialize(config.as_ref()).await {
            log::warn!("Source {id} failed to initialize: {e}");
            return Err(RegistryError::Initialization {
                id: id.to_string(),
                source: e,
            });
        }

        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::SourceNotFound { id: id.to_string() })?;
        entry.initialized = true;
        entry.enabled = true;

        log::info!("Enabled source {id}");
        Ok(())
    }

    /// Disables a source without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SourceNotFound`] if the id is unknown.
    pub async fn disable(&self, id: &str) -> Result<(), RegistryError> {
        let _mutation = self.mutations.lock().await;
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::SourceNotFound { id: id.to_string() })?;

        entry.enabled = false;
        log::info!("Disabled source {id}");
        Ok(())
    }

    /// Returns the registered sources, ordered by id.
    ///
    /// With `enabled_only`, only sources that are enabled and initialized
    /// are returned.
    pub async fn get_all(&self, enabled_only: bool) -> Vec<Arc<dyn AlertSource>> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !enabled_only || (e.enabled && e.initialized))
            .map(|e| Arc::clone(&e.source))
            .collect()
    }

    /// Lists every entry with its state, ordered by id.
    pub async fn descriptors(&self) -> Vec<RegisteredSource> {
        self.entries
            .read()
            .await
            .values()
            .map(|e| RegisteredSource {
                descriptor: e.source.descriptor().clone(),
                enabled: e.enabled,
                initialized: e.initialized,
            })
            .collect()
    }

    /// Returns `true` if a source with this id is registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Number of registered sources.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Disposes every initialized source and clears the registry.
    ///
    /// Each disposal is isolated: one failure does not stop the others.
    pub async fn dispose(&self) {
        let _mutation = self.mutations.lock().await;
        let entries = std::mem::take(&mut *self.entries.write().await);

        for (id, entry) in entries {
            if entry.initialized {
                dispose_quietly(entry.source.as_ref()).await;
            }
            log::debug!("Disposed source {id}");
        }
    }
}

async fn dispose_quietly(source: &dyn AlertSource) {
    if let Err(e) = source.dispose().await {
        log::warn!("Failed to dispose source {}: {e}", source.id());
    }
}
