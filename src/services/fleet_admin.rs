//! Administración de flota y conductores
//!
//! Altas, cambios y bajas de vehículos y conductores desde el panel del
//! administrador. Las operaciones de dos pasos (crear + asignar, crear +
//! credenciales) son llamadas independientes: si la segunda falla, la primera
//! queda aplicada en el backend.

use std::sync::Arc;

use crate::models::{
    Driver, DriverPatch, ProvisionDriverRequest, Vehicle, VehiclePatch, VehicleStatus,
};
use crate::services::confirmation::{prompts, Confirmation};
use crate::services::dispatch_coordinator::DispatchCoordinator;
use crate::utils::errors::{AppError, AppResult};

/// Formulario de vehículo del panel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleForm {
    pub plate: String,
    pub vehicle_type: String,
    pub last_location: String,
    pub assigned_driver_id: Option<String>,
}

impl VehicleForm {
    fn chosen_driver(&self) -> Option<&str> {
        self.assigned_driver_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Formulario de conductor del panel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverForm {
    pub id: String,
    pub name: String,
    pub license_class: String,
    pub rating: Option<f64>,
}

/// Estado de las credenciales del conductor después de guardarlo
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSync {
    Synced { username: String },
    /// El conductor quedó guardado pero sin login
    Failed { username: String, error: AppError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverRegistration {
    pub driver: Driver,
    pub credentials: CredentialSync,
}

pub struct FleetAdmin {
    coordinator: Arc<DispatchCoordinator>,
}

impl FleetAdmin {
    pub fn new(coordinator: Arc<DispatchCoordinator>) -> Self {
        Self { coordinator }
    }

    // ==================== VEHÍCULOS ====================

    /// Crear (`existing = None`) o actualizar un vehículo
    pub async fn save_vehicle(&self, form: &VehicleForm, existing: Option<&Vehicle>) -> AppResult<Vehicle> {
        let gateway = self.coordinator.gateway();

        match existing {
            Some(vehicle) => {
                // El backend exige un estado: se reenvía el guardado tal cual
                let status = match vehicle.wire_status() {
                    Some(raw) => raw.to_string(),
                    None => {
                        log::warn!(
                            "⚠️ Vehículo {} sin estado en el backend, se guarda como {}",
                            vehicle.id,
                            VehicleStatus::Unavailable
                        );
                        VehicleStatus::Unavailable.into()
                    }
                };
                let patch = VehiclePatch {
                    plate: Some(form.plate.clone()),
                    vehicle_type: Some(form.vehicle_type.clone()),
                    status: Some(status),
                    last_location: Some(form.last_location.clone()),
                    assigned_driver_id: Some(form.chosen_driver().unwrap_or_default().to_string()),
                    health: None,
                };
                self.coordinator
                    .mutate("actualizar vehículo", gateway.update_vehicle(&vehicle.id, &patch))
                    .await
            }
            None => {
                let patch = VehiclePatch {
                    plate: Some(form.plate.clone()),
                    vehicle_type: Some(form.vehicle_type.clone()),
                    status: Some(VehicleStatus::Available.into()),
                    last_location: Some(form.last_location.clone()),
                    assigned_driver_id: None,
                    health: Some("GOOD".to_string()),
                };
                let created = self
                    .coordinator
                    .mutate("registrar vehículo", gateway.create_vehicle(&patch))
                    .await?;
                log::info!("🚛 Vehículo {} registrado ({})", created.plate, created.id);

                match form.chosen_driver() {
                    Some(driver_id) => self.coordinator.assign_driver(&created.id, driver_id).await,
                    None => Ok(created),
                }
            }
        }
    }

    pub async fn delete_vehicle(&self, id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        if !confirm.confirm(prompts::DELETE_VEHICLE) {
            return Ok(false);
        }
        self.coordinator
            .mutate("dar de baja vehículo", self.coordinator.gateway().delete_vehicle(id))
            .await?;
        Ok(true)
    }

    // ==================== CONDUCTORES ====================

    /// Alta de un conductor y de su login
    ///
    /// El id es obligatorio porque también es la contraseña inicial.
    pub async fn register_driver(&self, form: &DriverForm) -> AppResult<DriverRegistration> {
        let id = form.id.trim();
        if id.is_empty() {
            return Err(AppError::MissingDriverId);
        }

        let patch = DriverPatch {
            id: Some(id.to_string()),
            name: Some(form.name.clone()),
            license_class: Some(form.license_class.clone()),
            availability: Some(true),
            rating: form.rating,
            ..Default::default()
        };
        let driver = self
            .coordinator
            .mutate("registrar conductor", self.coordinator.gateway().create_driver(&patch))
            .await?;
        log::info!("👤 Conductor {} registrado", driver.id);

        let credentials = self.sync_credentials(&form.name, id).await;
        Ok(DriverRegistration {
            driver,
            credentials,
        })
    }

    /// Guardar cambios y re-sincronizar las credenciales
    pub async fn update_driver(&self, id: &str, form: &DriverForm) -> AppResult<DriverRegistration> {
        let patch = DriverPatch {
            name: Some(form.name.clone()),
            license_class: Some(form.license_class.clone()),
            rating: form.rating,
            ..Default::default()
        };
        let driver = self
            .coordinator
            .mutate(
                "actualizar conductor",
                self.coordinator.gateway().update_driver_details(id, &patch),
            )
            .await?;

        let credentials = self.sync_credentials(&driver.name, id).await;
        Ok(DriverRegistration {
            driver,
            credentials,
        })
    }

    pub async fn delete_driver(&self, id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        if !confirm.confirm(prompts::DELETE_DRIVER) {
            return Ok(false);
        }
        self.coordinator
            .mutate("dar de baja conductor", self.coordinator.gateway().delete_driver(id))
            .await?;
        Ok(true)
    }

    pub async fn set_driver_location(&self, id: &str, location: &str, destination: &str) -> AppResult<()> {
        self.coordinator.update_location(id, location, destination).await
    }

    pub async fn mark_on_leave(&self, id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        if !confirm.confirm(prompts::ADMIN_LEAVE) {
            return Ok(false);
        }
        self.coordinator.apply_leave(id).await?;
        Ok(true)
    }

    pub async fn raise_emergency(&self, id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        self.coordinator
            .raise_emergency_with_prompt(id, prompts::ADMIN_EMERGENCY, confirm)
            .await
    }

    /// Username = nombre normalizado, password = id del driver
    async fn sync_credentials(&self, name: &str, driver_id: &str) -> CredentialSync {
        let request = ProvisionDriverRequest::for_driver(name, driver_id);
        let username = request.username.clone();

        match self.coordinator.gateway().provision_driver(&request).await {
            Ok(()) => {
                log::info!("🔑 Login '{}' sincronizado para {}", username, driver_id);
                CredentialSync::Synced { username }
            }
            Err(error) => {
                log::warn!(
                    "⚠️ Conductor {} guardado pero sin credenciales: {}",
                    driver_id,
                    error
                );
                CredentialSync::Failed { username, error }
            }
        }
    }
}
