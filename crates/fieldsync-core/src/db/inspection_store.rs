//! Inspection store implementation

use crate::error::{Error, Result};
use crate::models::{now_millis, Inspection, InspectionStatus, SyncStatus};
use libsql::{params, Connection, Row};

/// Trait for inspection storage operations (async)
#[allow(async_fn_in_trait)]
pub trait InspectionStore {
    /// Fetch all inspections, newest first
    async fn get_all(&self) -> Result<Vec<Inspection>>;

    /// Fetch an inspection by id
    async fn get(&self, id: &str) -> Result<Option<Inspection>>;

    /// Upsert an inspection, stamping `updated_at` with the current time
    async fn save(&self, inspection: &Inspection) -> Result<Inspection>;

    /// Delete an inspection by id
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch all inspections awaiting sync (index lookup, not a scan)
    async fn pending_sync(&self) -> Result<Vec<Inspection>>;

    /// Adopt a server-assigned id for a locally-created inspection.
    ///
    /// Rewrites the inspection id, marks it synced, and rewrites every
    /// evidence record referencing the old id, all in one transaction so a
    /// child is never left pointing at a dangling temporary id.
    async fn adopt_remote_id(&self, old_id: &str, new_id: &str) -> Result<()>;

    /// Update only the sync status of an inspection
    async fn set_sync_status(&self, id: &str, status: SyncStatus) -> Result<()>;
}

/// libSQL implementation of `InspectionStore`
pub struct LibSqlInspectionStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlInspectionStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_inspection(row: &Row) -> Result<Inspection> {
        let status: String = row.get(4)?;
        let data: String = row.get(5)?;
        let sync_status: String = row.get(6)?;
        Ok(Inspection {
            id: row.get(0)?,
            title: row.get(1)?,
            client_name: row.get(2)?,
            address: row.get(3)?,
            status: InspectionStatus::parse(&status)
                .ok_or_else(|| Error::Database(format!("invalid inspection status: {status}")))?,
            data: serde_json::from_str(&data)?,
            sync_status: SyncStatus::parse(&sync_status)
                .ok_or_else(|| Error::Database(format!("invalid sync status: {sync_status}")))?,
            updated_at: row.get(7)?,
        })
    }

    async fn query_many(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Inspection>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut inspections = Vec::new();
        while let Some(row) = rows.next().await? {
            inspections.push(Self::parse_inspection(&row)?);
        }
        Ok(inspections)
    }
}

const SELECT_COLUMNS: &str =
    "id, title, client_name, address, status, data, sync_status, updated_at";

impl InspectionStore for LibSqlInspectionStore<'_> {
    async fn get_all(&self) -> Result<Vec<Inspection>> {
        self.query_many(
            &format!("SELECT {SELECT_COLUMNS} FROM inspections ORDER BY updated_at DESC"),
            (),
        )
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Inspection>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM inspections WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_inspection(&row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, inspection: &Inspection) -> Result<Inspection> {
        let mut stamped = inspection.clone();
        stamped.updated_at = now_millis();

        self.conn
            .execute(
                "INSERT INTO inspections (id, title, client_name, address, status, data, sync_status, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     client_name = excluded.client_name,
                     address = excluded.address,
                     status = excluded.status,
                     data = excluded.data,
                     sync_status = excluded.sync_status,
                     updated_at = excluded.updated_at",
                params![
                    stamped.id.as_str(),
                    stamped.title.as_str(),
                    stamped.client_name.as_str(),
                    stamped.address.as_str(),
                    stamped.status.as_str(),
                    serde_json::to_string(&stamped.data)?,
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
            .execute("DELETE FROM inspections WHERE id = ?", [id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn pending_sync(&self) -> Result<Vec<Inspection>> {
        self.query_many(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM inspections
                 WHERE sync_status = 'pending'
                 ORDER BY updated_at ASC"
            ),
            (),
        )
        .await
    }

    async fn adopt_remote_id(&self, old_id: &str, new_id: &str) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            let rows = self
                .conn
                .execute(
                    "UPDATE inspections SET id = ?, sync_status = 'synced' WHERE id = ?",
                    [new_id, old_id],
                )
                .await?;
            if rows == 0 {
                return Err(Error::NotFound(old_id.to_string()));
            }

            self.conn
                .execute(
                    "UPDATE evidences SET inspection_id = ? WHERE inspection_id = ?",
                    [new_id, old_id],
                )
                .await?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn set_sync_status(&self, id: &str, status: SyncStatus) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE inspections SET sync_status = ? WHERE id = ?",
                [status.as_str(), id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::evidence_store::{EvidenceStore, LibSqlEvidenceStore};
    use crate::db::Database;
    use crate::models::Evidence;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_get() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());

        let inspection = Inspection::new_local("Roof survey", "Acme", "1 Main St");
        let saved = store.save(&inspection).await.unwrap();

        let fetched = store.get(&saved.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Roof survey");
        assert_eq!(fetched.sync_status, SyncStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_is_upsert_and_stamps_updated_at() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());

        let inspection = Inspection::new_local("Roof survey", "Acme", "1 Main St");
        let first = store.save(&inspection).await.unwrap();

        let mut edited = first.clone();
        edited.title = "Roof survey (revised)".to_string();
        let second = store.save(&edited).await.unwrap();

        assert!(second.updated_at >= first.updated_at);

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Roof survey (revised)");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_sync_excludes_synced_and_failed() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());

        let mut synced = Inspection::new_local("Synced", "Acme", "1 Main St");
        synced.id = "42".to_string();
        synced.sync_status = SyncStatus::Synced;
        store.save(&synced).await.unwrap();

        let mut failed = Inspection::new_local("Failed", "Acme", "2 Main St");
        failed.sync_status = SyncStatus::Failed;
        store.save(&failed).await.unwrap();

        store
            .save(&Inspection::new_local("Pending", "Acme", "3 Main St"))
            .await
            .unwrap();

        let pending = store.pending_sync().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Pending");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_adopt_remote_id_rewrites_evidence_references() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());
        let evidence_store = LibSqlEvidenceStore::new(db.connection());

        let inspection = Inspection::new_local("Roof survey", "Acme", "1 Main St");
        let local_id = inspection.id.clone();
        store.save(&inspection).await.unwrap();

        let evidence = Evidence::new_local(&local_id, "crack.jpg", vec![1, 2, 3], "crack");
        evidence_store.save(&evidence).await.unwrap();

        store.adopt_remote_id(&local_id, "42").await.unwrap();

        let adopted = store.get("42").await.unwrap().unwrap();
        assert_eq!(adopted.sync_status, SyncStatus::Synced);
        assert!(store.get(&local_id).await.unwrap().is_none());

        let children = evidence_store.get_by_inspection("42").await.unwrap();
        assert_eq!(children.len(), 1);
        assert!(evidence_store
            .get_by_inspection(&local_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_adopt_remote_id_missing_record() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());

        let result = store.adopt_remote_id("local-0", "42").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_record() {
        let db = setup().await;
        let store = LibSqlInspectionStore::new(db.connection());

        let result = store.delete("nope").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
