use crate::domain::ports::errors::DatabaseError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

/// Database connection pool manager
///
/// Manages the `SQLite` connection pool with WAL mode enabled.
/// Handles connection lifecycle, migrations, and configuration.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - `SQLite` database URL (e.g., "sqlite:.installtrack/installtrack.db")
    /// * `max_connections` - Upper bound on pooled connections
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL
    /// - Foreign keys: Enabled
    /// - Busy timeout: 5 seconds
    /// - Idle timeout: 30 seconds
    /// - Max lifetime: 30 minutes
    /// - Acquire timeout: 10 seconds
    ///
    /// In-memory databases are private to a connection, so they are pinned to
    /// a single pooled connection that is never recycled.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Invalid database URL: {e}"))
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(max_connections.max(1))
                .idle_timeout(Duration::from_secs(30))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!(
                    "Failed to create connection pool: {e}"
                ))
            })?;

        Ok(Self { pool })
    }

    /// Open the database at a filesystem path, creating parent directories.
    pub async fn open_path(path: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionPoolError(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Self::new(&format!("sqlite:{path}"), max_connections).await
    }

    /// Run migrations at startup
    ///
    /// Safe to call multiple times - only applies new migrations.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_creation() {
        let db = DatabaseConnection::new("sqlite::memory:", 5)
            .await
            .expect("Failed to create connection");

        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migration_creates_tables() {
        let db = DatabaseConnection::new("sqlite::memory:", 1)
            .await
            .expect("Failed to create connection");
        db.migrate().await.expect("Failed to run migrations");
        // Re-running is a no-op
        db.migrate().await.expect("Failed to re-run migrations");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('devices', 'installations') ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("failed to query tables");

        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();
        assert_eq!(names, vec!["devices".to_string(), "installations".to_string()]);

        db.close().await;
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = DatabaseConnection::new("postgres://nope", 1).await;
        assert!(matches!(result, Err(DatabaseError::ConnectionPoolError(_))));
    }
}
