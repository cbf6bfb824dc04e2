//! Manual classification overrides keyed by transaction hash.

use crate::core::transaction::Classification;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOverride {
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub type OverrideMap = BTreeMap<String, ClassificationOverride>;

/// Persistence collaborator holding the override map between runs.
pub trait OverrideBackend: Send + Sync {
    fn load(&self) -> Result<OverrideMap>;
    fn save(&self, overrides: &OverrideMap) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("transaction hash must not be empty")]
    EmptyHash,
    #[error("unrecognized classification: {0}")]
    InvalidClassification(String),
    #[error("override storage failed: {0}")]
    Backend(#[source] anyhow::Error),
}

pub struct OverrideStore {
    backend: Box<dyn OverrideBackend>,
    entries: OverrideMap,
}

impl OverrideStore {
    /// Loads the current overrides from `backend`. Backend failures propagate.
    pub fn open(backend: impl OverrideBackend + 'static) -> Result<Self, OverrideError> {
        let entries = backend.load().map_err(OverrideError::Backend)?;
        debug!("Loaded {} classification overrides", entries.len());
        Ok(Self {
            backend: Box::new(backend),
            entries,
        })
    }

    pub fn get(&self, hash: &str) -> Option<Classification> {
        self.entries.get(hash).map(|o| o.classification)
    }

    pub fn entry(&self, hash: &str) -> Option<&ClassificationOverride> {
        self.entries.get(hash)
    }

    pub fn set(
        &mut self,
        hash: &str,
        classification: Classification,
        note: Option<String>,
    ) -> Result<(), OverrideError> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(OverrideError::EmptyHash);
        }
        let note = note.filter(|n| !n.trim().is_empty());

        let mut updated = self.entries.clone();
        updated.insert(
            hash.to_string(),
            ClassificationOverride {
                classification,
                note,
            },
        );
        self.backend.save(&updated).map_err(OverrideError::Backend)?;
        self.entries = updated;
        debug!("Override set for {hash}: {classification}");
        Ok(())
    }

    /// Validates a user-supplied classification name before storing it.
    pub fn set_from_str(
        &mut self,
        hash: &str,
        classification: &str,
        note: Option<String>,
    ) -> Result<(), OverrideError> {
        let classification = classification
            .parse::<Classification>()
            .map_err(|_| OverrideError::InvalidClassification(classification.to_string()))?;
        self.set(hash, classification, note)
    }

    /// Returns whether an override existed for `hash`.
    pub fn remove(&mut self, hash: &str) -> Result<bool, OverrideError> {
        let hash = hash.trim();
        if !self.entries.contains_key(hash) {
            return Ok(false);
        }
        let mut updated = self.entries.clone();
        updated.remove(hash);
        self.backend.save(&updated).map_err(OverrideError::Backend)?;
        self.entries = updated;
        debug!("Override removed for {hash}");
        Ok(true)
    }

    pub fn all(&self) -> &OverrideMap {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
