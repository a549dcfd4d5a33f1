//! SQLite-backed [`SessionStore`].
//!
//! Sessions are stored as a JSON document alongside a few queryable
//! columns. Feedback order is insertion order (`rowid`), which an
//! `ON CONFLICT .. DO UPDATE` upsert preserves.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{FeedbackAction, FeedbackEvent, PreferenceWeights, SearchSession};

use super::SessionStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid timestamp in store: {}", raw))?
        .with_timezone(&Utc))
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get_session(&self, id: &str) -> Result<Option<SearchSession>> {
        let row = sqlx::query("SELECT session_json FROM search_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("session_json")?;
                let session = serde_json::from_str(&json)
                    .with_context(|| format!("corrupt session record: {}", id))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn put_session(&self, session: &SearchSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        sqlx::query(
            r#"
            INSERT INTO search_sessions (id, criteria_ref, status, progress, session_json,
                                         created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                session_json = excluded.session_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id)
        .bind(&session.criteria_ref)
        .bind(session.status.as_str())
        .bind(session.progress)
        .bind(&json)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        for table in ["feedback_events", "preference_weights", "seen_listings"] {
            sqlx::query(&format!("DELETE FROM {} WHERE session_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM search_sessions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_feedback(&self, event: &FeedbackEvent) -> Result<()> {
        let features = serde_json::to_string(&event.features)?;
        sqlx::query(
            r#"
            INSERT INTO feedback_events (session_id, listing_id, action, features_json, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(session_id, listing_id) DO UPDATE SET
                action = excluded.action,
                features_json = excluded.features_json,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(&event.session_id)
        .bind(&event.listing_id)
        .bind(event.action.as_str())
        .bind(&features)
        .bind(event.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT listing_id, action, features_json, recorded_at
            FROM feedback_events
            WHERE session_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let action: String = row.try_get("action")?;
            let features: String = row.try_get("features_json")?;
            let recorded_at: String = row.try_get("recorded_at")?;
            events.push(FeedbackEvent {
                session_id: session_id.to_string(),
                listing_id: row.try_get("listing_id")?,
                action: FeedbackAction::parse(&action)?,
                features: serde_json::from_str(&features)?,
                recorded_at: parse_ts(&recorded_at)?,
            });
        }
        Ok(events)
    }

    async fn get_weights(&self, session_id: &str) -> Result<Option<PreferenceWeights>> {
        let row = sqlx::query(
            "SELECT weights_json, sample_size FROM preference_weights WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let weights: String = row.try_get("weights_json")?;
                let sample_size: i64 = row.try_get("sample_size")?;
                Ok(Some(PreferenceWeights {
                    session_id: session_id.to_string(),
                    weights: serde_json::from_str(&weights)?,
                    sample_size: sample_size.max(0) as usize,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put_weights(&self, weights: &PreferenceWeights) -> Result<()> {
        let json = serde_json::to_string(&weights.weights)?;
        sqlx::query(
            r#"
            INSERT INTO preference_weights (session_id, weights_json, sample_size, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                weights_json = excluded.weights_json,
                sample_size = excluded.sample_size,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&weights.session_id)
        .bind(&json)
        .bind(weights.sample_size as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_seen(&self, session_id: &str, listing_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO seen_listings (session_id, listing_id, seen_at) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(listing_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn seen_ids(&self, session_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT listing_id FROM seen_listings WHERE session_id = ? ORDER BY rowid",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
