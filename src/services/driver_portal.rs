//! Portal del conductor
//!
//! Vista del conductor que actúa en la sesión: su perfil, su job activo y las
//! acciones de autoservicio. Un 404 del perfil deja al portal bloqueado hasta
//! que un perfil vuelva a cargar.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Driver, Job};
use crate::services::confirmation::Confirmation;
use crate::services::dispatch_coordinator::DispatchCoordinator;
use crate::state::SessionStore;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortalState {
    pub profile: Option<Driver>,
    pub active_job: Option<Job>,
    /// Mensaje de pantalla completa cuando el driver no existe
    pub blocking_error: Option<String>,
}

impl PortalState {
    pub fn is_blocked(&self) -> bool {
        self.blocking_error.is_some()
    }
}

pub struct DriverPortal {
    coordinator: Arc<DispatchCoordinator>,
    driver_id: String,
    state: RwLock<PortalState>,
}

impl DriverPortal {
    /// Abrir el portal para el conductor de la sesión
    pub async fn open(coordinator: Arc<DispatchCoordinator>, session: &SessionStore) -> AppResult<Self> {
        let driver_id = session.acting_driver().await.ok_or(AppError::NotLoggedIn)?;
        Ok(Self::for_driver(coordinator, &driver_id))
    }

    pub fn for_driver(coordinator: Arc<DispatchCoordinator>, driver_id: &str) -> Self {
        Self {
            coordinator,
            driver_id: driver_id.to_string(),
            state: RwLock::new(PortalState::default()),
        }
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub async fn state(&self) -> PortalState {
        self.state.read().await.clone()
    }

    /// Cargar perfil y jobs, y recalcular el job activo
    pub async fn load(&self) -> PortalState {
        let profile = self.coordinator.driver_profile(&self.driver_id).await;
        self.coordinator.refresh_jobs().await;
        let active_job = self.coordinator.active_job_for(&self.driver_id).await;

        let mut state = self.state.write().await;
        match profile {
            Ok(driver) => {
                state.profile = Some(driver);
                state.blocking_error = None;
            }
            Err(e) if e.is_not_found() => {
                log::error!("❌ Driver {} no existe en el servicio de conductores", self.driver_id);
                state.profile = None;
                state.blocking_error = Some(format!(
                    "Driver ID '{}' not found. Please contact admin.",
                    self.driver_id
                ));
            }
            Err(e) => {
                log::warn!("⚠️ No se pudo cargar el perfil de {}: {}", self.driver_id, e);
            }
        }
        state.active_job = active_job;
        state.clone()
    }

    pub async fn set_available(&self) -> AppResult<PortalState> {
        self.coordinator.set_available(&self.driver_id).await?;
        Ok(self.load().await)
    }

    pub async fn take_leave(&self) -> AppResult<PortalState> {
        self.coordinator.apply_leave(&self.driver_id).await?;
        Ok(self.load().await)
    }

    /// `Ok(None)` si el conductor no confirmó
    pub async fn raise_emergency(&self, confirm: &dyn Confirmation) -> AppResult<Option<PortalState>> {
        if !self.coordinator.raise_emergency(&self.driver_id, confirm).await? {
            return Ok(None);
        }
        Ok(Some(self.load().await))
    }

    /// El destino enviado es el del job activo, o vacío si no hay
    pub async fn update_location(&self, location: &str) -> AppResult<PortalState> {
        let destination = self
            .current_active_job()
            .await
            .map(|job| job.destination)
            .unwrap_or_default();
        self.coordinator
            .update_location(&self.driver_id, location, &destination)
            .await?;
        Ok(self.load().await)
    }

    pub async fn mark_arrival(&self) -> AppResult<PortalState> {
        let job = self
            .current_active_job()
            .await
            .ok_or_else(|| AppError::NoActiveJob(self.driver_id.clone()))?;
        log::info!("🏁 Llegada de {} en job {}", self.driver_id, job.short_id());
        self.coordinator.mark_arrival(&job.id).await?;
        Ok(self.load().await)
    }

    async fn current_active_job(&self) -> Option<Job> {
        let cached = self.state.read().await.active_job.clone();
        match cached {
            Some(job) => Some(job),
            None => self.coordinator.active_job_for(&self.driver_id).await,
        }
    }
}
