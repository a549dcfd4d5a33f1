//! In-memory [`SessionStore`] for tests and single-process deployments.
//!
//! Each key space lives in its own `HashMap` behind a `std::sync::RwLock`.
//! A poisoned lock surfaces as an error rather than a panic.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{FeedbackEvent, PreferenceWeights, SearchSession};

use super::SessionStore;

pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SearchSession>>,
    feedback: RwLock<HashMap<String, Vec<FeedbackEvent>>>,
    weights: RwLock<HashMap<String, PreferenceWeights>>,
    seen: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            feedback: RwLock::new(HashMap::new()),
            weights: RwLock::new(HashMap::new()),
            seen: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("memory store lock poisoned")
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, id: &str) -> Result<Option<SearchSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    async fn put_session(&self, session: &SearchSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let existed = self.sessions.write().map_err(poisoned)?.remove(id).is_some();
        self.feedback.write().map_err(poisoned)?.remove(id);
        self.weights.write().map_err(poisoned)?.remove(id);
        self.seen.write().map_err(poisoned)?.remove(id);
        Ok(existed)
    }

    async fn upsert_feedback(&self, event: &FeedbackEvent) -> Result<()> {
        let mut feedback = self.feedback.write().map_err(poisoned)?;
        let events = feedback.entry(event.session_id.clone()).or_default();
        match events.iter_mut().find(|e| e.listing_id == event.listing_id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(())
    }

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEvent>> {
        let feedback = self.feedback.read().map_err(poisoned)?;
        Ok(feedback.get(session_id).cloned().unwrap_or_default())
    }

    async fn get_weights(&self, session_id: &str) -> Result<Option<PreferenceWeights>> {
        let weights = self.weights.read().map_err(poisoned)?;
        Ok(weights.get(session_id).cloned())
    }

    async fn put_weights(&self, weights: &PreferenceWeights) -> Result<()> {
        let mut stored = self.weights.write().map_err(poisoned)?;
        stored.insert(weights.session_id.clone(), weights.clone());
        Ok(())
    }

    async fn mark_seen(&self, session_id: &str, listing_id: &str) -> Result<()> {
        let mut seen = self.seen.write().map_err(poisoned)?;
        let ids = seen.entry(session_id.to_string()).or_default();
        if !ids.iter().any(|id| id == listing_id) {
            ids.push(listing_id.to_string());
        }
        Ok(())
    }

    async fn seen_ids(&self, session_id: &str) -> Result<Vec<String>> {
        let seen = self.seen.read().map_err(poisoned)?;
        Ok(seen.get(session_id).cloned().unwrap_or_default())
    }
}
