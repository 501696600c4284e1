//! Database migrations
//!
//! Versioned through a `schema_version` table. Migrations only ever add;
//! existing records survive every upgrade.

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Apply a migration's statements inside a transaction
async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: record stores and the mutation queue
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Inspection records
            "CREATE TABLE IF NOT EXISTS inspections (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                client_name TEXT NOT NULL,
                address TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                sync_status TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_inspections_sync ON inspections(sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_inspections_status ON inspections(status)",
            "CREATE INDEX IF NOT EXISTS idx_inspections_updated ON inspections(updated_at DESC)",
            // Evidence records, indexed by parent for the cascading id rewrite
            "CREATE TABLE IF NOT EXISTS evidences (
                id TEXT PRIMARY KEY,
                inspection_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                content BLOB NOT NULL,
                caption TEXT NOT NULL DEFAULT '',
                category TEXT,
                notes TEXT,
                file_key TEXT,
                sync_status TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_evidences_inspection ON evidences(inspection_id)",
            "CREATE INDEX IF NOT EXISTS idx_evidences_sync ON evidences(sync_status)",
            // Arbitrary user data
            "CREATE TABLE IF NOT EXISTS user_data (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            // Pending mutation queue, drained oldest-first
            "CREATE TABLE IF NOT EXISTS sync_queue (
                id TEXT PRIMARY KEY,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                body TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_timestamp ON sync_queue(timestamp ASC)",
            // Record migration version
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: idempotency tokens on queued mutations
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "ALTER TABLE sync_queue ADD COLUMN idempotency_key TEXT NOT NULL DEFAULT ''",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
