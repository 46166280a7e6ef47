use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::domain::models::{ChangeEvent, Device, DeviceStatus};
use crate::domain::ports::device_repository::{DeviceFilters, DeviceRepository};
use crate::domain::ports::DatabaseError;
use crate::infrastructure::database::change_feed::BroadcastChangeFeed;

/// SQLite implementation of DeviceRepository using sqlx
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
    feed: BroadcastChangeFeed,
}

impl SqliteDeviceRepository {
    pub fn new(pool: SqlitePool, feed: BroadcastChangeFeed) -> Self {
        Self { pool, feed }
    }

    fn row_to_device(row: &SqliteRow) -> Result<Device, DatabaseError> {
        Ok(Device {
            id: row.get("id"),
            team_id: row.get("team_id"),
            box_number: row.get("box_number"),
            box_opened: row.get::<i64, _>("box_opened") != 0,
            assigned_installer_id: row.get("assigned_installer_id"),
            status: row
                .get::<String, _>("status")
                .parse()
                .map_err(DatabaseError::InvalidData)?,
        })
    }
}

#[async_trait]
impl DeviceRepository for SqliteDeviceRepository {
    #[instrument(skip(self, device), fields(device_id = %device.id), err)]
    async fn upsert(&self, device: &Device) -> Result<(), DatabaseError> {
        sqlx::query(
            r"INSERT INTO devices (id, team_id, box_number, box_opened, assigned_installer_id, status, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                team_id = excluded.team_id,
                box_number = excluded.box_number,
                assigned_installer_id = excluded.assigned_installer_id,
                updated_at = excluded.updated_at",
        )
        .bind(&device.id)
        .bind(&device.team_id)
        .bind(&device.box_number)
        .bind(i64::from(device.box_opened))
        .bind(&device.assigned_installer_id)
        .bind(device.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if let Some(stored) = self.get(&device.id).await? {
            self.feed.publish(ChangeEvent::DeviceUpdated(stored));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Device>, DatabaseError> {
        let row = sqlx::query("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_device).transpose()
    }

    #[instrument(skip(self), err)]
    async fn update_status(
        &self,
        id: &str,
        status: DeviceStatus,
    ) -> Result<Option<Device>, DatabaseError> {
        let result = sqlx::query("UPDATE devices SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!("device not in registry; status not updated");
            return Ok(None);
        }

        let device = self.get(id).await?;
        if let Some(device) = &device {
            self.feed.publish(ChangeEvent::DeviceUpdated(device.clone()));
        }
        Ok(device)
    }

    #[instrument(skip(self), err)]
    async fn open_box(&self, team_id: &str, box_number: &str) -> Result<usize, DatabaseError> {
        let result = sqlx::query(
            "UPDATE devices SET box_opened = 1, updated_at = ? WHERE team_id = ? AND box_number = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(team_id)
        .bind(box_number)
        .execute(&self.pool)
        .await?;

        let opened = self
            .list(DeviceFilters {
                team_id: Some(team_id.to_string()),
                box_number: Some(box_number.to_string()),
                status: None,
            })
            .await?;
        for device in opened {
            self.feed.publish(ChangeEvent::DeviceUpdated(device));
        }

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    async fn list(&self, filters: DeviceFilters) -> Result<Vec<Device>, DatabaseError> {
        let mut query = String::from("SELECT * FROM devices WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(team_id) = &filters.team_id {
            query.push_str(" AND team_id = ?");
            bindings.push(team_id.clone());
        }
        if let Some(box_number) = &filters.box_number {
            query.push_str(" AND box_number = ?");
            bindings.push(box_number.clone());
        }
        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        query.push_str(" ORDER BY id ASC");

        let mut q = sqlx::query(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_device).collect()
    }
}
