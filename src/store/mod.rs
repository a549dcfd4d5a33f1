//! Storage abstraction for search sessions and feedback.
//!
//! The [`SessionStore`] trait is the only shared mutable structure in the
//! harness. It exposes four disjoint key spaces, all keyed by session id:
//!
//! | Key space | Writer | Operations |
//! |-----------|--------|------------|
//! | sessions | pipeline coordinator | [`get_session`](SessionStore::get_session), [`put_session`](SessionStore::put_session), [`delete_session`](SessionStore::delete_session) |
//! | feedback | feedback learner | [`upsert_feedback`](SessionStore::upsert_feedback), [`list_feedback`](SessionStore::list_feedback) |
//! | weights | feedback learner | [`get_weights`](SessionStore::get_weights), [`put_weights`](SessionStore::put_weights) |
//! | seen ids | caller surface | [`mark_seen`](SessionStore::mark_seen), [`seen_ids`](SessionStore::seen_ids) |
//!
//! Readers get a snapshot; there is no transaction spanning a whole
//! session update, so a status read may observe a pipeline mid-run.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::models::{FeedbackEvent, PreferenceWeights, SearchSession};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend for sessions, feedback, and learned weights.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: &str) -> Result<Option<SearchSession>>;

    /// Insert or replace the session with the same id.
    async fn put_session(&self, session: &SearchSession) -> Result<()>;

    /// Remove a session and everything recorded against it.
    ///
    /// Returns `false` if no such session existed.
    async fn delete_session(&self, id: &str) -> Result<bool>;

    /// Insert or replace the event for `(session_id, listing_id)`.
    ///
    /// A replaced event keeps its original position in
    /// [`list_feedback`](SessionStore::list_feedback) order.
    async fn upsert_feedback(&self, event: &FeedbackEvent) -> Result<()>;

    /// All events for a session, in first-recorded order.
    async fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEvent>>;

    async fn get_weights(&self, session_id: &str) -> Result<Option<PreferenceWeights>>;

    /// Replace the session's weights wholesale.
    async fn put_weights(&self, weights: &PreferenceWeights) -> Result<()>;

    /// Record that a listing has been shown to the user. Idempotent.
    async fn mark_seen(&self, session_id: &str, listing_id: &str) -> Result<()>;

    /// Seen listing ids, in first-seen order.
    async fn seen_ids(&self, session_id: &str) -> Result<Vec<String>>;
}

/// Open the backend selected by `[store].backend`.
///
/// The SQLite backend creates its schema on open.
pub async fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    if config.store.is_sqlite() {
        let path = config
            .store
            .path
            .as_deref()
            .context("store.path must be set when store.backend is 'sqlite'")?;
        let pool = crate::db::connect(path).await?;
        crate::migrate::create_schema(&pool).await?;
        tracing::info!(path = %path.display(), "opened sqlite session store");
        Ok(Arc::new(SqliteStore::new(pool)))
    } else {
        Ok(Arc::new(MemoryStore::new()))
    }
}
