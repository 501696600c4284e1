//! Evidence store implementation

use crate::error::{Error, Result};
use crate::models::{now_millis, Evidence, SyncStatus};
use libsql::{params, Connection, Row};

/// Trait for evidence storage operations (async)
#[allow(async_fn_in_trait)]
pub trait EvidenceStore {
    /// Fetch one evidence record by id
    async fn get(&self, id: &str) -> Result<Option<Evidence>>;

    /// Fetch all evidence attached to an inspection (index lookup)
    async fn get_by_inspection(&self, inspection_id: &str) -> Result<Vec<Evidence>>;

    /// Upsert an evidence record, stamping `updated_at`
    async fn save(&self, evidence: &Evidence) -> Result<Evidence>;

    /// Delete an evidence record by id
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch all evidence awaiting sync (index lookup, not a scan)
    async fn pending_sync(&self) -> Result<Vec<Evidence>>;

    /// Adopt the server id and storage key after a successful upload
    async fn adopt_upload(&self, old_id: &str, new_id: &str, file_key: &str) -> Result<()>;

    /// Update only the sync status of an evidence record
    async fn set_sync_status(&self, id: &str, status: SyncStatus) -> Result<()>;
}

/// libSQL implementation of `EvidenceStore`
pub struct LibSqlEvidenceStore<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str =
    "id, inspection_id, file_name, content, caption, category, notes, file_key, sync_status, updated_at";

impl<'a> LibSqlEvidenceStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_evidence(row: &Row) -> Result<Evidence> {
        let sync_status: String = row.get(8)?;
        Ok(Evidence {
            id: row.get(0)?,
            inspection_id: row.get(1)?,
            file_name: row.get(2)?,
            content: row.get(3)?,
            caption: row.get(4)?,
            category: row.get(5)?,
            notes: row.get(6)?,
            file_key: row.get(7)?,
            sync_status: SyncStatus::parse(&sync_status)
                .ok_or_else(|| Error::Database(format!("invalid sync status: {sync_status}")))?,
            updated_at: row.get(9)?,
        })
    }

    async fn query_many(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Evidence>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut evidences = Vec::new();
        while let Some(row) = rows.next().await? {
            evidences.push(Self::parse_evidence(&row)?);
        }
        Ok(evidences)
    }
}

impl EvidenceStore for LibSqlEvidenceStore<'_> {
    async fn get(&self, id: &str) -> Result<Option<Evidence>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM evidences WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_evidence(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_inspection(&self, inspection_id: &str) -> Result<Vec<Evidence>> {
        self.query_many(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM evidences
                 WHERE inspection_id = ?
                 ORDER BY updated_at ASC"
            ),
            [inspection_id],
        )
        .await
    }

    async fn save(&self, evidence: &Evidence) -> Result<Evidence> {
        let mut stamped = evidence.clone();
        stamped.updated_at = now_millis();

        self.conn
            .execute(
                "INSERT INTO evidences (id, inspection_id, file_name, content, caption, category, notes, file_key, sync_status, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     inspection_id = excluded.inspection_id,
                     file_name = excluded.file_name,
                     content = excluded.content,
                     caption = excluded.caption,
                     category = excluded.category,
                     notes = excluded.notes,
                     file_key = excluded.file_key,
                     sync_status = excluded.sync_status,
                     updated_at = excluded.updated_at",
                params![
                    stamped.id.as_str(),
                    stamped.inspection_id.as_str(),
                    stamped.file_name.as_str(),
                    stamped.content.clone(),
                    stamped.caption.as_str(),
                    stamped.category.clone(),
                    stamped.notes.clone(),
                    stamped.file_key.clone(),
                    stamped.sync_status.as_str(),
                    stamped.updated_at,
                ],
            )
            .await?;

        Ok(stamped)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM evidences WHERE id = ?", [id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn pending_sync(&self) -> Result<Vec<Evidence>> {
        self.query_many(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM evidences
                 WHERE sync_status = 'pending'
                 ORDER BY updated_at ASC"
            ),
            (),
        )
        .await
    }

    async fn adopt_upload(&self, old_id: &str, new_id: &str, file_key: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE evidences SET id = ?, file_key = ?, sync_status = 'synced' WHERE id = ?",
                [new_id, file_key, old_id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(old_id.to_string()));
        }

        Ok(())
    }

    async fn set_sync_status(&self, id: &str, status: SyncStatus) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE evidences SET sync_status = ? WHERE id = ?",
                [status.as_str(), id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}
