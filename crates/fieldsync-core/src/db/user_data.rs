//! User-data store implementation

use crate::error::Result;
use crate::models::{now_millis, UserBlob};
use libsql::{params, Connection};

/// Trait for user-data storage operations (async)
#[allow(async_fn_in_trait)]
pub trait UserDataStore {
    /// Fetch a blob by key
    async fn get(&self, id: &str) -> Result<Option<UserBlob>>;

    /// Upsert a blob, stamping `updated_at`
    async fn save(&self, blob: &UserBlob) -> Result<UserBlob>;
}

/// libSQL implementation of `UserDataStore`
pub struct LibSqlUserDataStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlUserDataStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl UserDataStore for LibSqlUserDataStore<'_> {
    async fn get(&self, id: &str) -> Result<Option<UserBlob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, data, updated_at FROM user_data WHERE id = ?",
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let data: String = row.get(1)?;
                Ok(Some(UserBlob {
                    id: row.get(0)?,
                    data: serde_json::from_str(&data)?,
                    updated_at: row.get(2)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, blob: &UserBlob) -> Result<UserBlob> {
        let mut stamped = blob.clone();
        stamped.updated_at = now_millis();

        self.conn
            .execute(
                "INSERT OR REPLACE INTO user_data (id, data, updated_at) VALUES (?, ?, ?)",
                params![
                    stamped.id.as_str(),
                    serde_json::to_string(&stamped.data)?,
                    stamped.updated_at,
                ],
            )
            .await?;

        Ok(stamped)
    }
}
