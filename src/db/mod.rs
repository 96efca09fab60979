//! Document store access.
//!
//! [`Db`] owns the memoized connection attempt; [`Connection`] performs the
//! collection-scoped operations once the store is reachable.

mod connection;
mod error;
mod future;
mod ids;

pub use connection::{Connection, HEALTHCHECK_COLLECTION};
pub use error::StoreError;
pub use future::{ConnectError, ConnectionFuture};
pub use ids::{IdStream, ID_BUFFER_CAPACITY};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// How to reach the backing store and which collections to serve.
#[derive(Debug, Clone)]
pub struct DbSettings {
    pub database_path: PathBuf,
    pub collections: HashSet<String>,
    pub max_connections: u32,
    /// Upper bound for establishing a single session.
    pub dial_timeout: Duration,
    /// Pause between failed dial attempts.
    pub retry_interval: Duration,
    /// Give up after this many failed dials. `None` retries forever.
    pub max_dial_attempts: Option<u32>,
}

impl DbSettings {
    pub fn new(
        database_path: impl Into<PathBuf>,
        collections: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            database_path: database_path.into(),
            collections: collections.into_iter().collect(),
            max_connections: 10,
            dial_timeout: Duration::from_secs(30),
            retry_interval: Duration::from_secs(5),
            max_dial_attempts: None,
        }
    }
}

/// Handle to the (possibly still connecting) document store.
///
/// Created once per process and shared by reference; clones share the same
/// connection attempt.
#[derive(Debug, Clone)]
pub struct Db {
    settings: DbSettings,
    connection: ConnectionFuture<Connection>,
}

impl Db {
    /// Starts connecting in the background and returns immediately.
    pub fn connect(settings: DbSettings) -> Self {
        let dial_settings = settings.clone();
        let connection = ConnectionFuture::spawn(dial_with_retry(dial_settings));
        Self {
            settings,
            connection,
        }
    }

    /// Starts a fresh, independent connection attempt with the same settings.
    ///
    /// The current handle keeps its outcome.
    pub fn redial(&self) -> Self {
        Self::connect(self.settings.clone())
    }

    /// Waits until the store is connected, or the attempt has failed for good.
    pub async fn open(&self) -> Result<Connection, StoreError> {
        self.connection
            .wait()
            .await
            .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))
    }

    /// Returns the connection without waiting.
    pub fn try_open(&self) -> Result<Connection, StoreError> {
        match self.connection.try_result() {
            Some(Ok(connection)) => Ok(connection),
            Some(Err(e)) => Err(StoreError::ConnectionUnavailable(e.to_string())),
            None => Err(StoreError::ConnectionUnavailable(
                "connection is not yet initialised".to_string(),
            )),
        }
    }

    /// The connection if it is already established.
    pub fn peek(&self) -> Option<Connection> {
        self.connection.peek()
    }

    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }
}

async fn dial_with_retry(settings: DbSettings) -> Result<Connection, ConnectError> {
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match dial(&settings).await {
            Ok(connection) => {
                tracing::info!(
                    database = %settings.database_path.display(),
                    attempts,
                    "Established connection to the document store"
                );
                return Ok(connection);
            }
            Err(e) => {
                tracing::error!(
                    database = %settings.database_path.display(),
                    attempts,
                    error = %e,
                    "Couldn't establish connection to the document store"
                );

                if settings.max_dial_attempts.is_some_and(|max| attempts >= max) {
                    return Err(ConnectError::new(format!(
                        "giving up after {} attempt(s): {}",
                        attempts, e
                    )));
                }
            }
        }

        tokio::time::sleep(settings.retry_interval).await;
    }
}

async fn dial(settings: &DbSettings) -> Result<Connection, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(&settings.database_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.dial_timeout)
        .connect_with(options)
        .await?;

    let connection = Connection::new(pool, settings.collections.clone());
    connection.create_tables().await?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(temp_dir: &TempDir) -> DbSettings {
        DbSettings::new(
            temp_dir.path().join("native.db"),
            vec!["methode".to_string()],
        )
    }

    /// Settings whose database can never be opened.
    fn unreachable_settings(temp_dir: &TempDir) -> DbSettings {
        let mut settings = DbSettings::new(
            temp_dir.path().join("missing-dir").join("native.db"),
            vec!["methode".to_string()],
        );
        settings.retry_interval = Duration::from_millis(10);
        settings.dial_timeout = Duration::from_millis(500);
        settings
    }

    #[tokio::test]
    async fn test_open_connects() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::connect(settings(&temp_dir));

        let connection = db.open().await.unwrap();
        assert!(connection.is_supported("methode"));
        assert!(db.try_open().is_ok());
        assert!(db.peek().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_open_returns_same_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::connect(settings(&temp_dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.open().await })
            })
            .collect();

        for handle in handles {
            let connection = handle.await.unwrap().unwrap();
            assert_eq!(connection.supported_collections(), &db.settings().collections);
        }
    }

    #[tokio::test]
    async fn test_bounded_retries_fail() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = unreachable_settings(&temp_dir);
        settings.max_dial_attempts = Some(3);

        let db = Db::connect(settings);
        let err = db.open().await.unwrap_err();

        assert!(matches!(&err, StoreError::ConnectionUnavailable(msg) if msg.contains("3 attempt")));
        assert!(matches!(
            db.try_open(),
            Err(StoreError::ConnectionUnavailable(_))
        ));
        assert!(db.peek().is_none());
    }

    #[tokio::test]
    async fn test_try_open_while_pending() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::connect(unreachable_settings(&temp_dir));

        // Retries forever, so it stays pending
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = db.try_open().unwrap_err();
        assert!(err.to_string().contains("not yet initialised"));
    }

    #[tokio::test]
    async fn test_retry_until_store_appears() {
        let temp_dir = TempDir::new().unwrap();
        let settings = unreachable_settings(&temp_dir);
        let parent = settings.database_path.parent().unwrap().to_path_buf();

        let db = Db::connect(settings);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(db.peek().is_none());

        std::fs::create_dir_all(&parent).unwrap();
        let connection = db.open().await.unwrap();
        assert!(connection.is_supported("methode"));
    }

    #[tokio::test]
    async fn test_redial_is_independent() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = unreachable_settings(&temp_dir);
        settings.max_dial_attempts = Some(1);
        let parent = settings.database_path.parent().unwrap().to_path_buf();

        let db = Db::connect(settings);
        assert!(db.open().await.is_err());

        std::fs::create_dir_all(&parent).unwrap();
        let fresh = db.redial();
        assert!(fresh.open().await.is_ok());
        // The original attempt keeps its failure
        assert!(db.open().await.is_err());
    }
}
