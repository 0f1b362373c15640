//! Coordinador de despacho
//!
//! Mantiene las vistas de jobs, vehículos y conductores, valida los nuevos
//! despachos contra el snapshot de vehículos y refresca después de cada
//! acción que modifica el backend. Las transiciones de estado las hace el
//! backend; aquí solo se piden acciones con nombre.

use futures::join;
use std::sync::Arc;

use crate::clients::FleetGateway;
use crate::models::{Driver, Job, JobPatch, JobStatus, Vehicle, VehicleStatus};
use crate::services::confirmation::{prompts, Confirmation};
use crate::services::versioned_collection::{ApplyOutcome, VersionedCollection};
use crate::utils::errors::{AppError, AppResult};

/// Resultado del refresh de una colección
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(usize),
    Superseded,
    Failed(AppError),
}

impl RefreshOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub jobs: RefreshOutcome,
    pub vehicles: RefreshOutcome,
    pub drivers: RefreshOutcome,
}

impl RefreshReport {
    pub fn failures(&self) -> Vec<(&'static str, &AppError)> {
        [
            ("jobs", &self.jobs),
            ("vehicles", &self.vehicles),
            ("drivers", &self.drivers),
        ]
        .into_iter()
        .filter_map(|(name, outcome)| match outcome {
            RefreshOutcome::Failed(error) => Some((name, error)),
            _ => None,
        })
        .collect()
    }
}

/// Vehículo ofrecido en el selector de despacho con su conductor asignado
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCandidate {
    pub vehicle: Vehicle,
    pub driver: Option<Driver>,
}

/// Contadores del dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub total_vehicles: usize,
    pub available: usize,
    pub in_transit: usize,
    pub maintenance: usize,
    pub active_jobs: usize,
    pub completed_jobs: usize,
}

pub struct DispatchCoordinator {
    gateway: Arc<dyn FleetGateway>,
    jobs: VersionedCollection<Job>,
    vehicles: VersionedCollection<Vehicle>,
    drivers: VersionedCollection<Driver>,
}

impl DispatchCoordinator {
    pub fn new(gateway: Arc<dyn FleetGateway>) -> Self {
        Self {
            gateway,
            jobs: VersionedCollection::new("jobs"),
            vehicles: VersionedCollection::new("vehicles"),
            drivers: VersionedCollection::new("drivers"),
        }
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn FleetGateway> {
        &self.gateway
    }

    // ==================== REFRESH ====================

    /// Refrescar las tres colecciones de forma independiente
    ///
    /// Una falla queda aislada en su colección: se registra y el snapshot
    /// anterior se conserva.
    pub async fn refresh(&self) -> RefreshReport {
        let (jobs, vehicles, drivers) =
            join!(self.refresh_jobs(), self.refresh_vehicles(), self.refresh_drivers());
        RefreshReport {
            jobs,
            vehicles,
            drivers,
        }
    }

    /// Los jobs se guardan del más reciente al más antiguo
    pub async fn refresh_jobs(&self) -> RefreshOutcome {
        let ticket = self.jobs.issue();
        match self.gateway.list_jobs().await {
            Ok(mut jobs) => {
                jobs.reverse();
                let count = jobs.len();
                outcome(self.jobs.apply(ticket, jobs).await, count)
            }
            Err(e) => self.fetch_failed(&self.jobs, e).await,
        }
    }

    pub async fn refresh_vehicles(&self) -> RefreshOutcome {
        let ticket = self.vehicles.issue();
        match self.gateway.list_vehicles().await {
            Ok(vehicles) => {
                let count = vehicles.len();
                outcome(self.vehicles.apply(ticket, vehicles).await, count)
            }
            Err(e) => self.fetch_failed(&self.vehicles, e).await,
        }
    }

    pub async fn refresh_drivers(&self) -> RefreshOutcome {
        let ticket = self.drivers.issue();
        match self.gateway.list_drivers().await {
            Ok(drivers) => {
                let count = drivers.len();
                outcome(self.drivers.apply(ticket, drivers).await, count)
            }
            Err(e) => self.fetch_failed(&self.drivers, e).await,
        }
    }

    async fn fetch_failed<T: Clone>(
        &self,
        collection: &VersionedCollection<T>,
        error: AppError,
    ) -> RefreshOutcome {
        log::warn!(
            "⚠️ No se pudo refrescar {}: {} (se mantiene el último snapshot)",
            collection.name(),
            error
        );
        collection.record_failure(error.clone()).await;
        RefreshOutcome::Failed(error)
    }

    // ==================== VISTAS ====================

    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.items().await
    }

    pub async fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.items().await
    }

    pub async fn drivers(&self) -> Vec<Driver> {
        self.drivers.items().await
    }

    pub async fn jobs_version(&self) -> u64 {
        self.jobs.applied_version().await
    }

    /// Colecciones cuyo último fetch falló, con el error que lo provocó
    pub async fn stale_collections(&self) -> Vec<(&'static str, AppError)> {
        let (jobs, vehicles, drivers) = join!(
            self.jobs.last_error(),
            self.vehicles.last_error(),
            self.drivers.last_error()
        );
        [
            (self.jobs.name(), jobs),
            (self.vehicles.name(), vehicles),
            (self.drivers.name(), drivers),
        ]
        .into_iter()
        .filter_map(|(name, error)| error.map(|e| (name, e)))
        .collect()
    }

    /// Vehículos AVAILABLE con su conductor asignado (si está en el snapshot)
    pub async fn dispatch_candidates(&self) -> Vec<DispatchCandidate> {
        let drivers = self.drivers.items().await;
        self.vehicles
            .items()
            .await
            .into_iter()
            .filter(Vehicle::is_dispatchable)
            .map(|vehicle| {
                let driver = vehicle
                    .assigned_driver()
                    .and_then(|id| drivers.iter().find(|d| d.id == id))
                    .cloned();
                DispatchCandidate { vehicle, driver }
            })
            .collect()
    }

    /// Job activo del conductor: el primero PENDING o IN_PROGRESS en el
    /// orden en que el backend lista los jobs
    pub async fn active_job_for(&self, driver_id: &str) -> Option<Job> {
        self.jobs
            .items()
            .await
            .into_iter()
            .rev()
            .find(|job| job.is_assigned_to(driver_id) && job.status.is_active())
    }

    pub async fn fleet_summary(&self) -> FleetSummary {
        let vehicles = self.vehicles.items().await;
        let jobs = self.jobs.items().await;
        let count_status = |status: VehicleStatus| vehicles.iter().filter(|v| v.status == status).count();

        FleetSummary {
            total_vehicles: vehicles.len(),
            available: count_status(VehicleStatus::Available),
            in_transit: count_status(VehicleStatus::InTransit),
            maintenance: count_status(VehicleStatus::Maintenance),
            active_jobs: jobs.iter().filter(|j| j.status.is_active()).count(),
            completed_jobs: jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .count(),
        }
    }

    // ==================== DESPACHO ====================

    /// Crear un job contra un vehículo AVAILABLE del snapshot actual
    ///
    /// El driver del job es el asignado al vehículo en este momento y no se
    /// vuelve a resolver si el vehículo cambia de conductor.
    pub async fn create_job(&self, pickup: &str, destination: &str, vehicle_id: &str) -> AppResult<Job> {
        let vehicle = self
            .vehicles
            .items()
            .await
            .into_iter()
            .find(|v| v.id == vehicle_id)
            .ok_or_else(|| {
                log::warn!("🚫 Despacho rechazado: vehículo {} desconocido", vehicle_id);
                AppError::UnknownVehicle(vehicle_id.to_string())
            })?;

        if !vehicle.is_dispatchable() {
            log::warn!(
                "🚫 Despacho rechazado: vehículo {} en estado {}",
                vehicle_id,
                vehicle.status
            );
            return Err(AppError::VehicleNotAvailable {
                id: vehicle.id,
                status: vehicle.status.to_string(),
            });
        }

        let payload = JobPatch {
            pickup: Some(pickup.to_string()),
            destination: Some(destination.to_string()),
            status: Some(JobStatus::Pending),
            vehicle_id: Some(vehicle.id.clone()),
            driver_id: vehicle.assigned_driver().map(str::to_string),
        };

        let job = self.gateway.create_job(&payload).await.map_err(|e| {
            log::error!("❌ Dispatch Failed: {}", e.alert());
            e
        })?;
        log::info!(
            "🚚 Job {} despachado: {} -> {} (vehículo {}, driver {:?})",
            job.short_id(),
            job.pickup,
            job.destination,
            vehicle.id,
            job.driver_id
        );

        let created = job.clone();
        self.jobs
            .mutate_optimistic(move |jobs| {
                if !jobs.iter().any(|j| j.id == created.id) {
                    jobs.insert(0, created);
                }
            })
            .await;

        self.refresh().await;
        Ok(job)
    }

    /// Devuelve `false` si el operador no confirmó
    pub async fn cancel_job(&self, job_id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        if !confirm.confirm(prompts::CANCEL_JOB) {
            return Ok(false);
        }
        let patch = JobPatch {
            status: Some(JobStatus::Cancelled),
            ..Default::default()
        };
        self.mutate("cancelar job", self.gateway.update_job(job_id, &patch))
            .await?;
        Ok(true)
    }

    pub async fn delete_job(&self, job_id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        if !confirm.confirm(prompts::DELETE_JOB) {
            return Ok(false);
        }
        self.mutate("eliminar job", self.gateway.delete_job(job_id))
            .await?;
        Ok(true)
    }

    /// Fija la arista vehículo -> conductor; los jobs existentes no cambian
    pub async fn assign_driver(&self, vehicle_id: &str, driver_id: &str) -> AppResult<Vehicle> {
        self.mutate(
            "asignar conductor",
            self.gateway.assign_driver(vehicle_id, driver_id),
        )
        .await
    }

    pub async fn mark_arrival(&self, job_id: &str) -> AppResult<()> {
        self.mutate("marcar llegada", self.gateway.mark_arrival(job_id))
            .await
    }

    pub async fn mark_stop(&self, job_id: &str, stop_name: &str) -> AppResult<()> {
        self.mutate("marcar parada", self.gateway.mark_stop(job_id, stop_name))
            .await
    }

    pub async fn flag_job_emergency(&self, job_id: &str) -> AppResult<()> {
        self.mutate("emergencia de job", self.gateway.job_emergency(job_id))
            .await
    }

    // ==================== CONDUCTOR ====================

    pub async fn driver_profile(&self, driver_id: &str) -> AppResult<Driver> {
        self.gateway.get_driver(driver_id).await
    }

    pub async fn set_available(&self, driver_id: &str) -> AppResult<()> {
        self.mutate(
            "marcar disponible",
            self.gateway.update_availability(driver_id, true),
        )
        .await
    }

    pub async fn apply_leave(&self, driver_id: &str) -> AppResult<()> {
        self.mutate("aplicar licencia", self.gateway.apply_leave(driver_id))
            .await
    }

    pub async fn raise_emergency(&self, driver_id: &str, confirm: &dyn Confirmation) -> AppResult<bool> {
        self.raise_emergency_with_prompt(driver_id, prompts::DRIVER_EMERGENCY, confirm)
            .await
    }

    pub(crate) async fn raise_emergency_with_prompt(
        &self,
        driver_id: &str,
        prompt: &str,
        confirm: &dyn Confirmation,
    ) -> AppResult<bool> {
        if !confirm.confirm(prompt) {
            return Ok(false);
        }
        log::warn!("🆘 Emergencia reportada para el conductor {}", driver_id);
        self.mutate("reportar emergencia", self.gateway.raise_emergency(driver_id))
            .await?;
        Ok(true)
    }

    pub async fn update_location(&self, driver_id: &str, location: &str, destination: &str) -> AppResult<()> {
        self.mutate(
            "actualizar ubicación",
            self.gateway.update_location(driver_id, location, destination),
        )
        .await
    }

    /// Ejecuta una mutación del backend y refresca si tuvo éxito
    pub(crate) async fn mutate<T, F>(&self, action: &str, call: F) -> AppResult<T>
    where
        F: std::future::Future<Output = AppResult<T>>,
    {
        match call.await {
            Ok(value) => {
                log::info!("✅ {} completado", action);
                self.refresh().await;
                Ok(value)
            }
            Err(e) => {
                log::error!("❌ Error al {}: {}", action, e);
                Err(e)
            }
        }
    }
}

fn outcome(applied: ApplyOutcome, count: usize) -> RefreshOutcome {
    match applied {
        ApplyOutcome::Applied => RefreshOutcome::Applied(count),
        ApplyOutcome::Superseded => RefreshOutcome::Superseded,
    }
}
