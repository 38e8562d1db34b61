//! Cached concept names and types.

use chartsync_model::{ConceptType, Domain, Record};
use chartsync_store::{Filter, LocalStore, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Locale used when a concept has no name in the requested one.
pub const FALLBACK_LOCALE: &str = "en";

/// Concept names in one locale and the type of every concept.
#[derive(Debug, Default)]
pub struct ConceptSnapshot {
    locale: String,
    names: HashMap<String, String>,
    types: HashMap<String, ConceptType>,
}

impl ConceptSnapshot {
    /// Returns the locale of the names.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Returns the display name of a concept.
    pub fn name(&self, uuid: &str) -> Option<&str> {
        self.names.get(uuid).map(String::as_str)
    }

    /// Returns the type of a concept.
    pub fn concept_type(&self, uuid: &str) -> Option<ConceptType> {
        self.types.get(uuid).copied()
    }

    /// Returns the display form of an observed value.
    ///
    /// Coded values are concept uuids and are shown by name.
    pub fn display_value(&self, concept_uuid: &str, value: &str) -> String {
        match self.concept_type(concept_uuid) {
            Some(ConceptType::Coded) => self.name(value).unwrap_or(value).to_string(),
            _ => value.to_string(),
        }
    }

    /// Returns the number of concepts.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no concepts are loaded.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Lazily loaded concept data, shared by readers until invalidated.
#[derive(Debug, Default)]
pub struct ConceptCache {
    loaded: RwLock<Option<Arc<ConceptSnapshot>>>,
}

impl ConceptCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concepts for `locale`, loading them if needed.
    pub fn load(&self, store: &dyn LocalStore, locale: &str) -> StoreResult<Arc<ConceptSnapshot>> {
        if let Some(snapshot) = self.loaded.read().as_ref() {
            if snapshot.locale == locale {
                return Ok(Arc::clone(snapshot));
            }
        }

        let mut snapshot = ConceptSnapshot {
            locale: locale.to_string(),
            ..ConceptSnapshot::default()
        };
        for record in store.query(Domain::Concepts, &Filter::All)? {
            let Record::Concept(concept) = record else {
                continue;
            };
            let name = concept
                .names
                .get(locale)
                .or_else(|| concept.names.get(FALLBACK_LOCALE));
            if let Some(name) = name {
                snapshot.names.insert(concept.uuid.clone(), name.clone());
            }
            snapshot.types.insert(concept.uuid, concept.concept_type);
        }
        debug!(locale, concepts = snapshot.len(), "loaded concept data");

        let snapshot = Arc::new(snapshot);
        *self.loaded.write() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Drops the loaded data; the next [`load`](Self::load) reads the store.
    pub fn invalidate(&self) {
        *self.loaded.write() = None;
    }

    /// Returns true if data is loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.read().is_some()
    }
}
