//! In-memory preference book.
//!
//! Stands in for the conversational collaborator: callers register the
//! resolved [`Preferences`] for a criteria reference, and the pipeline
//! resolves them when a search starts. A reference with nothing
//! registered resolves to `None`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::Preferences;
use crate::traits::PreferenceResolver;

#[derive(Default)]
pub struct PreferenceBook {
    entries: RwLock<HashMap<String, Preferences>>,
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("preference book lock poisoned")
}

impl PreferenceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the preferences for `criteria_ref`.
    pub fn insert(&self, criteria_ref: &str, preferences: Preferences) -> Result<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(criteria_ref.to_string(), preferences);
        Ok(())
    }

    pub fn get(&self, criteria_ref: &str) -> Result<Option<Preferences>> {
        Ok(self.entries.read().map_err(poisoned)?.get(criteria_ref).cloned())
    }
}

#[async_trait]
impl PreferenceResolver for PreferenceBook {
    async fn resolve(&self, criteria_ref: &str) -> Result<Option<Preferences>> {
        self.get(criteria_ref)
    }
}

/// Read a preferences JSON file.
pub fn load_preferences(path: &Path) -> Result<Preferences> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preferences file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid preferences file: {}", path.display()))
}
