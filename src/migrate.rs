use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the session store schema for the configured SQLite database.
///
/// Returns `false` when the configured backend is in-memory and there is
/// nothing to create.
pub async fn run_migrations(config: &Config) -> Result<bool> {
    if !config.store.is_sqlite() {
        return Ok(false);
    }
    let path = config
        .store
        .path
        .as_deref()
        .context("store.path must be set when store.backend is 'sqlite'")?;

    let pool = db::connect(path).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(true)
}

/// Idempotently create every table and index.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_sessions (
            id TEXT PRIMARY KEY,
            criteria_ref TEXT NOT NULL,
            status TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0,
            session_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per (session, listing); re-swiping updates in place.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback_events (
            session_id TEXT NOT NULL,
            listing_id TEXT NOT NULL,
            action TEXT NOT NULL,
            features_json TEXT NOT NULL DEFAULT '{}',
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (session_id, listing_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS preference_weights (
            session_id TEXT PRIMARY KEY,
            weights_json TEXT NOT NULL,
            sample_size INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seen_listings (
            session_id TEXT NOT NULL,
            listing_id TEXT NOT NULL,
            seen_at TEXT NOT NULL,
            PRIMARY KEY (session_id, listing_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_sessions_criteria ON search_sessions(criteria_ref)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
