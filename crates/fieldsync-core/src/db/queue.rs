//! Pending-mutation queue implementation
//!
//! A durable FIFO of not-yet-acknowledged write operations, independent of
//! the record stores but referencing their records through mutation bodies.
//! Entries leave the queue only on confirmed success or at the retry
//! ceiling.

use crate::error::{Error, Result};
use crate::models::PendingMutation;
use libsql::{params, Connection, Row};

/// Trait for mutation queue operations (async)
#[allow(async_fn_in_trait)]
pub trait MutationQueue {
    /// Append a mutation; returns the stored entry with its generated id
    /// and idempotency key
    async fn enqueue(
        &self,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<PendingMutation>;

    /// Atomically remove and return the oldest entry (FIFO by timestamp)
    async fn dequeue_oldest(&self) -> Result<Option<PendingMutation>>;

    /// Persist a new attempt count for an entry
    async fn update_attempts(&self, id: &str, attempts: u32) -> Result<()>;

    /// Remove an entry by id
    async fn remove(&self, id: &str) -> Result<()>;

    /// List all entries, oldest first
    async fn list_all(&self) -> Result<Vec<PendingMutation>>;

    /// Number of queued entries
    async fn len(&self) -> Result<u64>;
}

/// libSQL implementation of `MutationQueue`
pub struct LibSqlMutationQueue<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str = "id, method, url, body, attempts, timestamp, idempotency_key";

impl<'a> LibSqlMutationQueue<'a> {
    /// Create a new queue with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_mutation(row: &Row) -> Result<PendingMutation> {
        let body: Option<String> = row.get(3)?;
        let attempts: i64 = row.get(4)?;
        Ok(PendingMutation {
            id: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            body: body.map(|text| serde_json::from_str(&text)).transpose()?,
            attempts: u32::try_from(attempts)
                .map_err(|_| Error::Database(format!("invalid attempt count: {attempts}")))?,
            timestamp: row.get(5)?,
            idempotency_key: row.get(6)?,
        })
    }
}

impl MutationQueue for LibSqlMutationQueue<'_> {
    async fn enqueue(
        &self,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<PendingMutation> {
        let mutation = PendingMutation::new(method, url, body);

        self.conn
            .execute(
                "INSERT INTO sync_queue (id, method, url, body, attempts, timestamp, idempotency_key)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    mutation.id.as_str(),
                    mutation.method.as_str(),
                    mutation.url.as_str(),
                    mutation
                        .body
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    i64::from(mutation.attempts),
                    mutation.timestamp,
                    mutation.idempotency_key.as_str(),
                ],
            )
            .await?;

        tracing::debug!(id = %mutation.id, method, url, "Queued mutation for replay");
        Ok(mutation)
    }

    async fn dequeue_oldest(&self) -> Result<Option<PendingMutation>> {
        // Peek and remove under one transaction so two drain loops can
        // never replay the same entry.
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            let mut rows = self
                .conn
                .query(
                    &format!(
                        "SELECT {SELECT_COLUMNS} FROM sync_queue
                         ORDER BY timestamp ASC, rowid ASC
                         LIMIT 1"
                    ),
                    (),
                )
                .await?;

            let Some(row) = rows.next().await? else {
                return Ok(None);
            };
            let mutation = Self::parse_mutation(&row)?;

            self.conn
                .execute("DELETE FROM sync_queue WHERE id = ?", [mutation.id.as_str()])
                .await?;

            Ok(Some(mutation))
        }
        .await;

        match result {
            Ok(mutation) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(mutation)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn update_attempts(&self, id: &str, attempts: u32) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue SET attempts = ? WHERE id = ?",
                params![i64::from(attempts), id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", [id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PendingMutation>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM sync_queue
                     ORDER BY timestamp ASC, rowid ASC"
                ),
                (),
            )
            .await?;

        let mut mutations = Vec::new();
        while let Some(row) = rows.next().await? {
            mutations.push(Self::parse_mutation(&row)?);
        }
        Ok(mutations)
    }

    async fn len(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }
}
