//! Device registry maintenance: bulk import and box opening.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Actor, Device, EditValidationError};
use crate::domain::ports::{DeviceFilters, DeviceRepository};
use crate::infrastructure::logging::audit::{self, AuditEventType};
use crate::services::authorize;

pub struct DeviceRegistry {
    devices: Arc<dyn DeviceRepository>,
}

impl DeviceRegistry {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    /// Upsert every device. Ids are trimmed; an empty id rejects the whole import
    /// before anything is written.
    #[instrument(skip(self, devices, actor), fields(count = devices.len(), actor = %actor.id), err)]
    pub async fn import(&self, devices: Vec<Device>, actor: &Actor) -> DomainResult<usize> {
        authorize(actor, actor.role.can_administer(), "import devices")?;

        let devices: Vec<Device> = devices
            .into_iter()
            .map(|mut device| {
                device.id = device.id.trim().to_string();
                device
            })
            .collect();
        if devices.iter().any(|d| d.id.is_empty()) {
            return Err(EditValidationError::EmptyDeviceId.into());
        }

        for device in &devices {
            self.devices.upsert(device).await?;
        }

        audit::record(
            AuditEventType::DeviceImported,
            &actor.id,
            "devices",
            &format!("{} devices", devices.len()),
        );
        info!(imported = devices.len(), "devices imported");
        Ok(devices.len())
    }

    /// Mark a team's box as opened, unlocking its devices for installation.
    #[instrument(skip(self, actor), fields(actor = %actor.id), err)]
    pub async fn open_box(
        &self,
        team_id: &str,
        box_number: &str,
        actor: &Actor,
    ) -> DomainResult<usize> {
        authorize(actor, actor.role.can_verify(), "open boxes")?;
        let opened = self.devices.open_box(team_id, box_number).await?;
        audit::record(
            AuditEventType::BoxOpened,
            &actor.id,
            &format!("{team_id}/{box_number}"),
            &format!("{opened} devices"),
        );
        Ok(opened)
    }

    pub async fn get(&self, id: &str) -> DomainResult<Device> {
        self.devices
            .get(id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(id.to_string()))
    }

    pub async fn list(&self, filters: DeviceFilters) -> DomainResult<Vec<Device>> {
        Ok(self.devices.list(filters).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DeviceStatus, Role};
    use crate::infrastructure::database::InMemoryStore;

    fn admin() -> Actor {
        Actor::new("adm-1", "Ana", Role::Admin)
    }

    #[tokio::test]
    async fn test_import_upserts_and_trims() {
        let store = InMemoryStore::new();
        let registry = DeviceRegistry::new(Arc::new(store));

        let first = vec![Device::new(" DEV-1 "), Device::new("DEV-2").with_team("t1")];
        assert_eq!(registry.import(first, &admin()).await.unwrap(), 2);

        let again = vec![Device::new("DEV-2").with_team("t2")];
        registry.import(again, &admin()).await.unwrap();

        assert!(registry.get("DEV-1").await.is_ok());
        assert_eq!(registry.get("DEV-2").await.unwrap().team_id.as_deref(), Some("t2"));
        assert_eq!(registry.list(DeviceFilters::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reimport_keeps_opened_box_and_status() {
        let store = InMemoryStore::new();
        let registry = DeviceRegistry::new(Arc::new(store.clone()));
        let device = Device::new("DEV-1").with_team("t").in_box("B1", false);
        registry.import(vec![device.clone()], &admin()).await.unwrap();
        let verifier = Actor::new("ver-1", "Vera", Role::Verifier);
        registry.open_box("t", "B1", &verifier).await.unwrap();
        DeviceRepository::update_status(&store, "DEV-1", DeviceStatus::Installed)
            .await
            .unwrap();

        registry.import(vec![device], &admin()).await.unwrap();
        let reimported = registry.get("DEV-1").await.unwrap();
        assert_eq!(reimported.status, DeviceStatus::Installed);
        assert!(reimported.box_opened);
    }

    #[tokio::test]
    async fn test_import_rejects_blank_ids_and_non_admins() {
        let store = InMemoryStore::new();
        let registry = DeviceRegistry::new(Arc::new(store));

        assert!(matches!(
            registry.import(vec![Device::new("  ")], &admin()).await,
            Err(DomainError::InvalidInput(_))
        ));
        let installer = Actor::new("inst-1", "Ada", Role::Installer);
        assert!(matches!(
            registry.import(vec![Device::new("DEV-1")], &installer).await,
            Err(DomainError::Forbidden { .. })
        ));
        assert!(matches!(
            registry.get("DEV-1").await,
            Err(DomainError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_box_counts_team_devices() {
        let store = InMemoryStore::new();
        let registry = DeviceRegistry::new(Arc::new(store));
        let devices = vec![
            Device::new("DEV-1").with_team("t1").in_box("B1", false),
            Device::new("DEV-2").with_team("t1").in_box("B1", false),
            Device::new("DEV-3").with_team("t2").in_box("B1", false),
        ];
        registry.import(devices, &admin()).await.unwrap();

        assert_eq!(registry.open_box("t1", "B1", &admin()).await.unwrap(), 2);
        assert!(registry.get("DEV-1").await.unwrap().box_opened);
        assert!(!registry.get("DEV-3").await.unwrap().box_opened);
        assert_eq!(registry.get("DEV-1").await.unwrap().status, DeviceStatus::Pending);
    }
}
