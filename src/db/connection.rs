//! Collection-scoped document operations against an open connection.
//!
//! Every collection is a table keyed by `uuid`:
//! ```text
//! uuid             TEXT    -- unique (see ensure_index)
//! content          BLOB    -- JSON text or raw bytes
//! is_json          INTEGER
//! content_type     TEXT    -- as supplied by the writer
//! origin_system_id TEXT    -- optional
//! ```

use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;
use super::ids::{spawn_producer, IdStream};
use crate::models::{Content, Resource};

/// Internal collection used by the health checks.
///
/// Always accessible, never reported as supported.
pub const HEALTHCHECK_COLLECTION: &str = "healthcheck";

#[derive(sqlx::FromRow)]
struct ResourceRow {
    uuid: String,
    content: Vec<u8>,
    is_json: bool,
    content_type: String,
    origin_system_id: Option<String>,
}

impl ResourceRow {
    fn into_resource(self) -> Result<Resource, StoreError> {
        let content = if self.is_json {
            let map: Map<String, Value> = serde_json::from_slice(&self.content)
                .map_err(|e| StoreError::CorruptContent(self.uuid.clone(), e))?;
            Content::Json(map)
        } else {
            Content::Binary(self.content)
        };

        Ok(Resource {
            id: self.uuid,
            content,
            content_type: self.content_type,
            origin_system_id: self.origin_system_id,
        })
    }
}

/// An open handle to the backing store.
///
/// Cheap to clone. Each operation checks out its own pooled session, so
/// operations never serialize on this handle.
#[derive(Debug, Clone)]
pub struct Connection {
    pool: SqlitePool,
    collections: Arc<HashSet<String>>,
}

impl Connection {
    pub(crate) fn new(pool: SqlitePool, collections: HashSet<String>) -> Self {
        Self {
            pool,
            collections: Arc::new(collections),
        }
    }

    /// Creates the table for every accessible collection if missing.
    pub(crate) async fn create_tables(&self) -> Result<(), StoreError> {
        let mut session = self.pool.acquire().await?;
        for collection in self.accessible_collections() {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    uuid TEXT NOT NULL,
                    content BLOB NOT NULL,
                    is_json INTEGER NOT NULL,
                    content_type TEXT NOT NULL,
                    origin_system_id TEXT
                )",
                quote_ident(collection)
            );
            sqlx::query(&sql).execute(&mut *session).await?;
        }
        Ok(())
    }

    /// The allow-list this connection was opened with.
    pub fn supported_collections(&self) -> &HashSet<String> {
        &self.collections
    }

    pub fn is_supported(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    fn accessible_collections(&self) -> impl Iterator<Item = &str> {
        self.collections
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(HEALTHCHECK_COLLECTION))
    }

    fn table_for(&self, collection: &str) -> Result<String, StoreError> {
        if self.is_supported(collection) || collection == HEALTHCHECK_COLLECTION {
            Ok(quote_ident(collection))
        } else {
            Err(StoreError::CollectionNotAllowed(collection.to_string()))
        }
    }

    /// Guarantees a unique index on `uuid` for every supported collection.
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        let mut session = self.pool.acquire().await?;
        for collection in self.accessible_collections() {
            let sql = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (uuid)",
                quote_ident(&format!("{}_uuid_index", collection)),
                quote_ident(collection)
            );
            sqlx::query(&sql).execute(&mut *session).await?;
            tracing::debug!(collection, "Ensured uuid index");
        }
        Ok(())
    }

    /// Reads a document. `Ok(None)` means no document has this id.
    pub async fn read(&self, collection: &str, id: &str) -> Result<Option<Resource>, StoreError> {
        let table = self.table_for(collection)?;
        let mut session = self.pool.acquire().await?;

        let sql = format!(
            "SELECT uuid, content, is_json, content_type, origin_system_id FROM {} WHERE uuid = ?",
            table
        );
        let row: Option<ResourceRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *session)
            .await?;

        row.map(ResourceRow::into_resource).transpose()
    }

    /// Upserts a document, fully replacing any previous version.
    pub async fn write(&self, collection: &str, resource: &Resource) -> Result<(), StoreError> {
        let table = self.table_for(collection)?;

        let (content, is_json) = match &resource.content {
            Content::Json(map) => (
                serde_json::to_vec(map)
                    .map_err(|e| StoreError::Encode(resource.id.clone(), e))?,
                true,
            ),
            Content::Binary(bytes) => (bytes.clone(), false),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE uuid = ?", table))
            .bind(&resource.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "INSERT INTO {} (uuid, content, is_json, content_type, origin_system_id)
             VALUES (?, ?, ?, ?, ?)",
            table
        ))
        .bind(&resource.id)
        .bind(&content)
        .bind(is_json)
        .bind(&resource.content_type)
        .bind(&resource.origin_system_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a document. Deleting a missing id succeeds.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let table = self.table_for(collection)?;
        let mut session = self.pool.acquire().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE uuid = ?", table))
            .bind(id)
            .execute(&mut *session)
            .await?;
        Ok(())
    }

    /// Streams every id in `collection` until exhausted or `token` is cancelled.
    ///
    /// Dropping the returned stream stops its producer without cancelling
    /// `token`.
    pub async fn read_ids(
        &self,
        token: CancellationToken,
        collection: &str,
    ) -> Result<IdStream, StoreError> {
        let table = self.table_for(collection)?;
        let session = self.pool.acquire().await?;

        Ok(spawn_producer(
            session,
            format!("SELECT uuid FROM {}", table),
            collection.to_string(),
            &token,
        ))
    }

    /// Closes every pooled session. Only for process shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
