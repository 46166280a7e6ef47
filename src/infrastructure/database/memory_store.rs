//! In-memory document store used by tests and dry runs.
//!
//! Behaves like the SQLite adapters: the same uniqueness rule on device id,
//! atomic batches, and change events after every committed write.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::{
    ChangeEvent, ChangeFilter, Device, DeviceStatus, Installation, InstallationPatch,
};
use crate::domain::ports::{
    BatchPatch, ChangeFeed, DatabaseError, DeviceFilters, DeviceRepository, InstallationFilters,
    InstallationRepository, MAX_BATCH_OPS,
};
use crate::infrastructure::database::change_feed::BroadcastChangeFeed;

#[derive(Default)]
struct State {
    installations: HashMap<Uuid, Installation>,
    devices: HashMap<String, Device>,
}

/// Shared in-memory store implementing both repositories and the change feed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    feed: BroadcastChangeFeed,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> BroadcastChangeFeed {
        self.feed.clone()
    }

    fn device_taken(state: &State, device_id: &str, except: Uuid) -> bool {
        state
            .installations
            .values()
            .any(|i| i.device_id == device_id && i.id != except)
    }
}

#[async_trait]
impl InstallationRepository for InMemoryStore {
    async fn insert(&self, installation: &Installation) -> Result<(), DatabaseError> {
        {
            let mut state = self.state.write().await;
            if Self::device_taken(&state, &installation.device_id, installation.id)
                || state.installations.contains_key(&installation.id)
            {
                return Err(DatabaseError::UniqueViolation(format!(
                    "an installation already exists for device {}",
                    installation.device_id
                )));
            }
            state
                .installations
                .insert(installation.id, installation.clone());
        }
        self.feed
            .publish(ChangeEvent::InstallationCreated(installation.clone()));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError> {
        Ok(self.state.read().await.installations.get(&id).cloned())
    }

    async fn find_by_device(&self, device_id: &str) -> Result<Option<Installation>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .installations
            .values()
            .find(|i| i.device_id == device_id)
            .cloned())
    }

    async fn patch(
        &self,
        id: Uuid,
        patch: &InstallationPatch,
    ) -> Result<Installation, DatabaseError> {
        let updated = {
            let mut state = self.state.write().await;
            let mut installation = state
                .installations
                .get(&id)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(id.to_string()))?;
            patch.apply(&mut installation, Utc::now());
            if Self::device_taken(&state, &installation.device_id, id) {
                return Err(DatabaseError::UniqueViolation(format!(
                    "an installation already exists for device {}",
                    installation.device_id
                )));
            }
            state.installations.insert(id, installation.clone());
            installation
        };
        self.feed
            .publish(ChangeEvent::InstallationUpdated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Installation>, DatabaseError> {
        let removed = self.state.write().await.installations.remove(&id);
        if let Some(existing) = &removed {
            self.feed.publish(ChangeEvent::InstallationDeleted {
                id,
                device_id: existing.device_id.clone(),
                team_id: existing.team_id.clone(),
                installed_by: existing.installed_by.clone(),
            });
        }
        Ok(removed)
    }

    async fn list(&self, filters: InstallationFilters) -> Result<Vec<Installation>, DatabaseError> {
        let state = self.state.read().await;
        let mut items: Vec<Installation> = state
            .installations
            .values()
            .filter(|i| filters.matches(i))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.created_at);
        if let Some(limit) = filters.limit {
            items.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(items)
    }

    async fn apply_batch(&self, batch: &[BatchPatch]) -> Result<usize, DatabaseError> {
        if batch.len() > MAX_BATCH_OPS {
            return Err(DatabaseError::BatchTooLarge(batch.len()));
        }
        let now = Utc::now();
        let updated = {
            let mut state = self.state.write().await;
            // Stage against a copy so a failure leaves nothing applied.
            let mut staged = state.installations.clone();
            let mut updated = Vec::with_capacity(batch.len());
            for op in batch {
                let installation = staged
                    .get_mut(&op.id)
                    .ok_or_else(|| DatabaseError::NotFound(op.id.to_string()))?;
                op.patch.apply(installation, now);
                updated.push(installation.clone());
            }
            state.installations = staged;
            updated
        };
        let count = updated.len();
        for installation in updated {
            self.feed
                .publish(ChangeEvent::InstallationUpdated(installation));
        }
        Ok(count)
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn upsert(&self, device: &Device) -> Result<(), DatabaseError> {
        let stored = {
            let mut state = self.state.write().await;
            let stored = state
                .devices
                .entry(device.id.clone())
                .and_modify(|existing| {
                    existing.team_id.clone_from(&device.team_id);
                    existing.box_number.clone_from(&device.box_number);
                    existing
                        .assigned_installer_id
                        .clone_from(&device.assigned_installer_id);
                })
                .or_insert_with(|| device.clone());
            stored.clone()
        };
        self.feed.publish(ChangeEvent::DeviceUpdated(stored));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Device>, DatabaseError> {
        Ok(self.state.read().await.devices.get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        status: DeviceStatus,
    ) -> Result<Option<Device>, DatabaseError> {
        let updated = {
            let mut state = self.state.write().await;
            state.devices.get_mut(id).map(|device| {
                device.status = status;
                device.clone()
            })
        };
        if let Some(device) = &updated {
            self.feed.publish(ChangeEvent::DeviceUpdated(device.clone()));
        }
        Ok(updated)
    }

    async fn open_box(&self, team_id: &str, box_number: &str) -> Result<usize, DatabaseError> {
        let opened: Vec<Device> = {
            let mut state = self.state.write().await;
            state
                .devices
                .values_mut()
                .filter(|d| {
                    d.team_id.as_deref() == Some(team_id)
                        && d.box_number.as_deref() == Some(box_number)
                })
                .map(|d| {
                    d.box_opened = true;
                    d.clone()
                })
                .collect()
        };
        let count = opened.len();
        for device in opened {
            self.feed.publish(ChangeEvent::DeviceUpdated(device));
        }
        Ok(count)
    }

    async fn list(&self, filters: DeviceFilters) -> Result<Vec<Device>, DatabaseError> {
        let state = self.state.read().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|d| filters.matches(d))
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }
}

impl ChangeFeed for InMemoryStore {
    fn subscribe(&self, filter: ChangeFilter) -> BoxStream<'static, ChangeEvent> {
        self.feed.subscribe(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_patch_rejects_device_collision() {
        let store = InMemoryStore::new();
        let a = Installation::new("DEV-A", "i", "1", 10.0);
        let b = Installation::new("DEV-B", "i", "1", 10.0);
        store.insert(&a).await.expect("insert a");
        store.insert(&b).await.expect("insert b");

        let patch = InstallationPatch {
            device_id: Some("DEV-A".into()),
            ..Default::default()
        };
        let err = store.patch(b.id, &patch).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
        let b_after = InstallationRepository::get(&store, b.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(b_after.device_id, "DEV-B");
    }

    #[tokio::test]
    async fn test_batch_failure_applies_nothing() {
        let store = InMemoryStore::new();
        let a = Installation::new("DEV-A", "i", "1", 10.0);
        store.insert(&a).await.expect("insert");
        let batch = vec![
            BatchPatch {
                id: a.id,
                patch: InstallationPatch {
                    location_id: Some("2".into()),
                    ..Default::default()
                },
            },
            BatchPatch {
                id: Uuid::new_v4(),
                patch: InstallationPatch::default(),
            },
        ];
        assert!(store.apply_batch(&batch).await.is_err());
        let after = InstallationRepository::get(&store, a.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(after.location_id, "1");
    }
}
