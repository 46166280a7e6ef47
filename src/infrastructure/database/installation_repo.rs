use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::models::{ChangeEvent, Installation, InstallationPatch};
use crate::domain::ports::installation_repository::{
    BatchPatch, InstallationFilters, InstallationRepository, MAX_BATCH_OPS,
};
use crate::domain::ports::DatabaseError;
use crate::infrastructure::database::change_feed::BroadcastChangeFeed;

/// SQLite implementation of InstallationRepository using sqlx
///
/// The JSON `document` column is authoritative. Projection columns are
/// rewritten from it on every write and exist only for indexed filtering.
pub struct SqliteInstallationRepository {
    pool: SqlitePool,
    feed: BroadcastChangeFeed,
    /// Serializes read-modify-write cycles so patches never interleave.
    write_lock: Arc<Mutex<()>>,
}

impl SqliteInstallationRepository {
    pub fn new(pool: SqlitePool, feed: BroadcastChangeFeed) -> Self {
        Self {
            pool,
            feed,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn decode(document: &str) -> Result<Installation, DatabaseError> {
        Ok(serde_json::from_str(document)?)
    }

    async fn load_for_update(
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<Installation, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM installations WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut **tx)
                .await?;
        let (document,) = row.ok_or_else(|| DatabaseError::NotFound(id.to_string()))?;
        Self::decode(&document)
    }

    async fn write_back(
        tx: &mut Transaction<'_, Sqlite>,
        installation: &Installation,
    ) -> Result<(), DatabaseError> {
        let document = serde_json::to_string(installation)?;
        sqlx::query(
            r"UPDATE installations
              SET device_id = ?, team_id = ?, installed_by = ?, location_id = ?, status = ?,
                  server_refreshed_at = ?, document = ?, updated_at = ?
              WHERE id = ?",
        )
        .bind(&installation.device_id)
        .bind(&installation.team_id)
        .bind(&installation.installed_by)
        .bind(&installation.location_id)
        .bind(installation.status.as_str())
        .bind(installation.server_refreshed_at.map(|t| t.to_rfc3339()))
        .bind(document)
        .bind(installation.updated_at.to_rfc3339())
        .bind(installation.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_unique(e, &installation.device_id))?;
        Ok(())
    }
}

fn map_unique(err: sqlx::Error, device_id: &str) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::UniqueViolation(
            format!("an installation already exists for device {device_id}"),
        ),
        _ => DatabaseError::QueryFailed(err),
    }
}

#[async_trait]
impl InstallationRepository for SqliteInstallationRepository {
    #[instrument(skip(self, installation), fields(id = %installation.id, device_id = %installation.device_id), err)]
    async fn insert(&self, installation: &Installation) -> Result<(), DatabaseError> {
        let document = serde_json::to_string(installation)?;
        sqlx::query(
            r"INSERT INTO installations (
                id, device_id, team_id, installed_by, location_id, status,
                server_refreshed_at, document, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(installation.id.to_string())
        .bind(&installation.device_id)
        .bind(&installation.team_id)
        .bind(&installation.installed_by)
        .bind(&installation.location_id)
        .bind(installation.status.as_str())
        .bind(installation.server_refreshed_at.map(|t| t.to_rfc3339()))
        .bind(document)
        .bind(installation.created_at.to_rfc3339())
        .bind(installation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, &installation.device_id))?;

        debug!("installation inserted");
        self.feed
            .publish(ChangeEvent::InstallationCreated(installation.clone()));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM installations WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(doc,)| Self::decode(&doc)).transpose()
    }

    async fn find_by_device(&self, device_id: &str) -> Result<Option<Installation>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM installations WHERE device_id = ?")
                .bind(device_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(doc,)| Self::decode(&doc)).transpose()
    }

    #[instrument(skip(self, patch), err)]
    async fn patch(
        &self,
        id: Uuid,
        patch: &InstallationPatch,
    ) -> Result<Installation, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut installation = Self::load_for_update(&mut tx, id).await?;
        patch.apply(&mut installation, Utc::now());
        Self::write_back(&mut tx, &installation).await?;
        tx.commit().await?;

        self.feed
            .publish(ChangeEvent::InstallationUpdated(installation.clone()));
        Ok(installation)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = match Self::load_for_update(&mut tx, id).await {
            Ok(installation) => installation,
            Err(DatabaseError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        sqlx::query("DELETE FROM installations WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.feed.publish(ChangeEvent::InstallationDeleted {
            id,
            device_id: existing.device_id.clone(),
            team_id: existing.team_id.clone(),
            installed_by: existing.installed_by.clone(),
        });
        Ok(Some(existing))
    }

    async fn list(&self, filters: InstallationFilters) -> Result<Vec<Installation>, DatabaseError> {
        let mut query = String::from("SELECT document FROM installations WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        if let Some(exclude_status) = filters.exclude_status {
            query.push_str(" AND status != ?");
            bindings.push(exclude_status.as_str().to_string());
        }

        if let Some(team_id) = &filters.team_id {
            query.push_str(" AND team_id = ?");
            bindings.push(team_id.clone());
        }

        if let Some(installed_by) = &filters.installed_by {
            query.push_str(" AND installed_by = ?");
            bindings.push(installed_by.clone());
        }

        if let Some(location_id) = &filters.location_id {
            query.push_str(" AND location_id = ?");
            bindings.push(location_id.clone());
        }

        query.push_str(" ORDER BY created_at ASC");

        if let Some(limit) = filters.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, (String,)>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(|(doc,)| Self::decode(doc)).collect()
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()), err)]
    async fn apply_batch(&self, batch: &[BatchPatch]) -> Result<usize, DatabaseError> {
        if batch.len() > MAX_BATCH_OPS {
            return Err(DatabaseError::BatchTooLarge(batch.len()));
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let mut updated = Vec::with_capacity(batch.len());
        for op in batch {
            let mut installation = Self::load_for_update(&mut tx, op.id).await?;
            op.patch.apply(&mut installation, now);
            Self::write_back(&mut tx, &installation).await?;
            updated.push(installation);
        }
        tx.commit().await?;

        let count = updated.len();
        for installation in updated {
            self.feed
                .publish(ChangeEvent::InstallationUpdated(installation));
        }
        Ok(count)
    }
}
