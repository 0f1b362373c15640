//! Gateway en memoria
//!
//! Reproduce el comportamiento de los servicios de flota, conductores y
//! despacho sobre colecciones en memoria. Se usa en los tests y en la consola
//! con `GATEWAY_MODE=memory`. Permite inyectar fallas por operación y guarda
//! el registro de llamadas recibidas.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::clients::FleetGateway;
use crate::models::{
    Driver, DriverPatch, DriverStatus, Job, JobPatch, JobStatus, LoginRequest, LoginResponse,
    ProvisionDriverRequest, UserRole, Vehicle, VehiclePatch, VehicleStatus,
};
use crate::state::SessionStore;
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

/// Nombres de operación usados en el registro de llamadas y en `fail_next`
pub mod ops {
    pub const LOGIN: &str = "auth.login";
    pub const PROVISION_DRIVER: &str = "auth.provision_driver";
    pub const LIST_VEHICLES: &str = "vehicles.list";
    pub const CREATE_VEHICLE: &str = "vehicles.create";
    pub const UPDATE_VEHICLE: &str = "vehicles.update";
    pub const DELETE_VEHICLE: &str = "vehicles.delete";
    pub const AVAILABLE_VEHICLE: &str = "vehicles.available";
    pub const VEHICLE_BY_PLATE: &str = "vehicles.by_plate";
    pub const UPDATE_VEHICLE_STATUS: &str = "vehicles.update_status";
    pub const ASSIGN_DRIVER: &str = "vehicles.assign_driver";
    pub const LIST_DRIVERS: &str = "drivers.list";
    pub const CREATE_DRIVER: &str = "drivers.create";
    pub const GET_DRIVER: &str = "drivers.get";
    pub const DELETE_DRIVER: &str = "drivers.delete";
    pub const UPDATE_AVAILABILITY: &str = "drivers.update_availability";
    pub const UPDATE_LOCATION: &str = "drivers.update_location";
    pub const UPDATE_DRIVER: &str = "drivers.update";
    pub const APPLY_LEAVE: &str = "drivers.apply_leave";
    pub const RAISE_EMERGENCY: &str = "drivers.raise_emergency";
    pub const LIST_JOBS: &str = "jobs.list";
    pub const CREATE_JOB: &str = "jobs.create";
    pub const GET_JOB: &str = "jobs.get";
    pub const UPDATE_JOB: &str = "jobs.update";
    pub const DELETE_JOB: &str = "jobs.delete";
    pub const MARK_ARRIVAL: &str = "jobs.mark_arrival";
    pub const MARK_STOP: &str = "jobs.mark_stop";
    pub const JOB_EMERGENCY: &str = "jobs.emergency";
}

/// Falla a inyectar en la próxima llamada de una operación
#[derive(Debug, Clone, PartialEq)]
pub enum InjectedFailure {
    Network,
    Status { status: u16, body: String },
}

/// Validación del documento de vehículo: el estado es obligatorio y libre
fn required_status(patch: &VehiclePatch) -> AppResult<&str> {
    patch
        .status
        .as_deref()
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .ok_or_else(|| AppError::Rejected {
            status: StatusCode::BAD_REQUEST.as_u16(),
            message: "Status is required".to_string(),
        })
}

impl InjectedFailure {
    pub fn status(status: u16, body: &str) -> Self {
        InjectedFailure::Status {
            status,
            body: body.to_string(),
        }
    }

    fn into_error(self) -> AppError {
        match self {
            InjectedFailure::Network => {
                AppError::Network("error sending request: connection refused".to_string())
            }
            InjectedFailure::Status { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                AppError::from_status(status, &body)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    role: UserRole,
    driver_id: Option<String>,
}

#[derive(Default)]
struct Backend {
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    jobs: Vec<Job>,
    users: HashMap<String, StoredUser>,
    tokens: HashSet<String>,
    require_auth: bool,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<InjectedFailure>>,
    latency: HashMap<String, VecDeque<Duration>>,
}

impl Backend {
    fn vehicle_mut(&mut self, id: &str) -> AppResult<&mut Vehicle> {
        self.vehicles
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    fn driver_mut(&mut self, id: &str) -> AppResult<&mut Driver> {
        self.drivers
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| not_found_error("Driver", id))
    }

    fn job_mut(&mut self, id: &str) -> AppResult<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| not_found_error("Job", id))
    }

    /// El servicio de conductores notifica a la flota: el vehículo del driver
    /// cambia de estado
    fn set_vehicle_status_of_driver(&mut self, driver_id: &str, status: VehicleStatus) {
        for vehicle in self
            .vehicles
            .iter_mut()
            .filter(|v| v.assigned_driver_id.as_deref() == Some(driver_id))
        {
            vehicle.set_status(status.clone());
        }
    }

    fn set_vehicle_status(&mut self, vehicle_id: Option<&str>, status: VehicleStatus) {
        if let Some(vehicle) = vehicle_id.and_then(|id| self.vehicles.iter_mut().find(|v| v.id == id)) {
            vehicle.set_status(status);
        }
    }

    fn set_driver_availability(&mut self, driver_id: Option<&str>, available: bool) {
        if let Some(driver) = driver_id.and_then(|id| self.drivers.iter_mut().find(|d| d.id == id)) {
            apply_availability(driver, available);
        }
    }
}

fn apply_availability(driver: &mut Driver, available: bool) {
    driver.availability = available;
    if available {
        driver.status = Some(DriverStatus::Available);
    } else if !matches!(
        driver.status,
        Some(DriverStatus::OnLeave) | Some(DriverStatus::Emergency)
    ) {
        driver.status = Some(DriverStatus::Busy);
    }
}

pub struct InMemoryGateway {
    backend: Mutex<Backend>,
    session: SessionStore,
}

impl InMemoryGateway {
    pub fn new(session: SessionStore) -> Self {
        Self {
            backend: Mutex::new(Backend::default()),
            session,
        }
    }

    /// Flota de demostración para la consola offline
    pub async fn with_demo_fleet(session: SessionStore) -> Self {
        let gateway = Self::new(session);
        gateway.add_user("admin", "admin123", UserRole::Admin, None).await;
        for (id, name, license) in [("DRV-001", "Alice Martin", "C"), ("DRV-002", "Bruno Diaz", "CE")] {
            gateway
                .seed_driver(Driver {
                    id: id.to_string(),
                    name: name.to_string(),
                    license_class: license.to_string(),
                    availability: true,
                    status: Some(DriverStatus::Available),
                    location: Some("HQ".to_string()),
                    destination: None,
                    assigned_vehicle_id: None,
                    rating: Some(5.0),
                })
                .await;
            gateway
                .add_user(
                    &crate::models::auth::normalize_username(name),
                    id,
                    UserRole::Driver,
                    Some(id),
                )
                .await;
        }
        for (id, plate, vehicle_type, driver) in [
            ("VEH-001", "AB-123-CD", "Truck", Some("DRV-001")),
            ("VEH-002", "EF-456-GH", "Van", Some("DRV-002")),
            ("VEH-003", "IJ-789-KL", "Sedan", None),
        ] {
            gateway
                .seed_vehicle(Vehicle {
                    id: id.to_string(),
                    plate: plate.to_string(),
                    vehicle_type: vehicle_type.to_string(),
                    status: VehicleStatus::Available,
                    status_raw: None,
                    last_location: Some("HQ".to_string()),
                    assigned_driver_id: driver.map(str::to_string),
                    health: Some("GOOD".to_string()),
                })
                .await;
        }
        gateway
    }

    pub async fn seed_vehicle(&self, vehicle: Vehicle) {
        self.backend.lock().await.vehicles.push(vehicle);
    }

    pub async fn seed_driver(&self, driver: Driver) {
        self.backend.lock().await.drivers.push(driver);
    }

    pub async fn seed_job(&self, job: Job) {
        self.backend.lock().await.jobs.push(job);
    }

    pub async fn add_user(&self, username: &str, password: &str, role: UserRole, driver_id: Option<&str>) {
        self.backend.lock().await.users.insert(
            username.to_string(),
            StoredUser {
                password: password.to_string(),
                role,
                driver_id: driver_id.map(str::to_string),
            },
        );
    }

    /// Exigir un token emitido por este backend en cada llamada
    pub async fn require_auth(&self, required: bool) {
        self.backend.lock().await.require_auth = required;
    }

    /// Invalidar todos los tokens emitidos (simula expiración en el servidor)
    pub async fn revoke_tokens(&self) {
        self.backend.lock().await.tokens.clear();
    }

    /// La próxima llamada a `op` falla con `failure`
    pub async fn fail_next(&self, op: &str, failure: InjectedFailure) {
        self.backend
            .lock()
            .await
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(failure);
    }

    /// La próxima respuesta de un listado `op` llega con `delay` de retraso,
    /// con los datos tomados antes de la espera
    pub async fn delay_next(&self, op: &str, delay: Duration) {
        self.backend
            .lock()
            .await
            .latency
            .entry(op.to_string())
            .or_default()
            .push_back(delay);
    }

    async fn simulate_latency(&self, op: &str) {
        let delay = self
            .backend
            .lock()
            .await
            .latency
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Cambiar el estado de un vehículo sin pasar por el cliente (otro operador)
    pub async fn set_vehicle_status(&self, id: &str, status: VehicleStatus) {
        self.backend.lock().await.set_vehicle_status(Some(id), status);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.backend.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: &str) -> usize {
        self.backend
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.as_str() == op)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.backend.lock().await.calls.clear();
    }

    pub async fn stored_vehicles(&self) -> Vec<Vehicle> {
        self.backend.lock().await.vehicles.clone()
    }

    pub async fn stored_drivers(&self) -> Vec<Driver> {
        self.backend.lock().await.drivers.clone()
    }

    pub async fn stored_jobs(&self) -> Vec<Job> {
        self.backend.lock().await.jobs.clone()
    }

    pub async fn stored_password(&self, username: &str) -> Option<String> {
        self.backend
            .lock()
            .await
            .users
            .get(username)
            .map(|user| user.password.clone())
    }

    /// Registrar la llamada, aplicar fallas inyectadas y verificar el bearer
    async fn enter(&self, op: &str) -> AppResult<MutexGuard<'_, Backend>> {
        let token = self.session.bearer().await;
        let mut backend = self.backend.lock().await;
        backend.calls.push(op.to_string());

        let injected = backend.failures.get_mut(op).and_then(VecDeque::pop_front);
        let error = match injected {
            Some(failure) => Some(failure.into_error()),
            None if backend.require_auth && op != ops::LOGIN => {
                let valid = token.map(|t| backend.tokens.contains(&t)).unwrap_or(false);
                (!valid).then_some(AppError::Unauthorized { status: 401 })
            }
            None => None,
        };

        match error {
            None => Ok(backend),
            Some(error) => {
                drop(backend);
                if let AppError::Unauthorized { status } = error {
                    self.session.authorization_failed(status).await;
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl FleetGateway for InMemoryGateway {
    async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse> {
        let mut backend = self.enter(ops::LOGIN).await?;
        let user = backend
            .users
            .get(&credentials.username)
            .filter(|user| user.password == credentials.password)
            .cloned();

        match user {
            Some(user) => {
                let token = format!("mem-{}", Uuid::new_v4());
                backend.tokens.insert(token.clone());
                Ok(LoginResponse {
                    token,
                    role: Some(user.role),
                    driver_id: user.driver_id,
                })
            }
            None => Err(AppError::Rejected {
                status: 401,
                message: "Incorrect username or password".to_string(),
            }),
        }
    }

    async fn provision_driver(&self, request: &ProvisionDriverRequest) -> AppResult<()> {
        let mut backend = self.enter(ops::PROVISION_DRIVER).await?;
        backend.users.insert(
            request.username.clone(),
            StoredUser {
                password: request.password_hash.clone(),
                role: UserRole::Driver,
                driver_id: Some(request.driver_id.clone()),
            },
        );
        Ok(())
    }

    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        let vehicles = self.enter(ops::LIST_VEHICLES).await?.vehicles.clone();
        self.simulate_latency(ops::LIST_VEHICLES).await;
        Ok(vehicles)
    }

    async fn create_vehicle(&self, vehicle: &VehiclePatch) -> AppResult<Vehicle> {
        let mut backend = self.enter(ops::CREATE_VEHICLE).await?;
        let status = required_status(vehicle)?;
        let created = Vehicle {
            id: Uuid::new_v4().to_string(),
            plate: vehicle.plate.clone().unwrap_or_default(),
            vehicle_type: vehicle.vehicle_type.clone().unwrap_or_default(),
            status: VehicleStatus::from_wire(status),
            status_raw: Some(status.to_string()),
            last_location: vehicle.last_location.clone(),
            assigned_driver_id: vehicle.assigned_driver_id.clone(),
            health: vehicle.health.clone(),
        };
        backend.vehicles.push(created.clone());
        Ok(created)
    }

    async fn update_vehicle(&self, id: &str, patch: &VehiclePatch) -> AppResult<Vehicle> {
        let mut backend = self.enter(ops::UPDATE_VEHICLE).await?;
        let status = required_status(patch)?;
        let vehicle = backend.vehicle_mut(id)?;
        vehicle.set_wire_status(status);
        if let Some(plate) = &patch.plate {
            vehicle.plate = plate.clone();
        }
        if let Some(vehicle_type) = &patch.vehicle_type {
            vehicle.vehicle_type = vehicle_type.clone();
        }
        if patch.last_location.is_some() {
            vehicle.last_location = patch.last_location.clone();
        }
        if patch.assigned_driver_id.is_some() {
            vehicle.assigned_driver_id = patch.assigned_driver_id.clone();
        }
        if patch.health.is_some() {
            vehicle.health = patch.health.clone();
        }
        Ok(vehicle.clone())
    }

    async fn delete_vehicle(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::DELETE_VEHICLE).await?;
        backend.vehicles.retain(|v| v.id != id);
        Ok(())
    }

    async fn available_vehicle_by_type(&self, vehicle_type: &str) -> AppResult<Vehicle> {
        let backend = self.enter(ops::AVAILABLE_VEHICLE).await?;
        backend
            .vehicles
            .iter()
            .find(|v| v.vehicle_type == vehicle_type && v.is_dispatchable())
            .cloned()
            .ok_or_else(|| conflict_error(&format!("No available vehicle of type: {}", vehicle_type)))
    }

    async fn vehicle_by_plate(&self, plate: &str) -> AppResult<Vehicle> {
        let backend = self.enter(ops::VEHICLE_BY_PLATE).await?;
        backend
            .vehicles
            .iter()
            .find(|v| v.plate == plate)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Vehicle not found with plate: {}", plate)))
    }

    async fn update_vehicle_status(&self, id: &str, status: &VehicleStatus) -> AppResult<()> {
        let mut backend = self.enter(ops::UPDATE_VEHICLE_STATUS).await?;
        backend.vehicle_mut(id)?.set_status(status.clone());
        Ok(())
    }

    async fn assign_driver(&self, vehicle_id: &str, driver_id: &str) -> AppResult<Vehicle> {
        let mut backend = self.enter(ops::ASSIGN_DRIVER).await?;
        backend.vehicle_mut(vehicle_id)?;
        if !backend.drivers.iter().any(|d| d.id == driver_id) {
            return Err(AppError::Rejected {
                status: 500,
                message: "Failed to verify driver: Driver not found in Driver Service".to_string(),
            });
        }
        let vehicle = backend.vehicle_mut(vehicle_id)?;
        vehicle.assigned_driver_id = Some(driver_id.to_string());
        Ok(vehicle.clone())
    }

    async fn list_drivers(&self) -> AppResult<Vec<Driver>> {
        let drivers = self.enter(ops::LIST_DRIVERS).await?.drivers.clone();
        self.simulate_latency(ops::LIST_DRIVERS).await;
        Ok(drivers)
    }

    async fn create_driver(&self, driver: &DriverPatch) -> AppResult<Driver> {
        let mut backend = self.enter(ops::CREATE_DRIVER).await?;
        let id = driver
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if backend.drivers.iter().any(|d| d.id == id) {
            return Err(conflict_error(&format!("Driver already exists: {}", id)));
        }
        let created = Driver {
            id,
            name: driver.name.clone().unwrap_or_default(),
            license_class: driver.license_class.clone().unwrap_or_default(),
            availability: driver.availability.unwrap_or(false),
            status: driver.status.clone(),
            location: driver.location.clone(),
            destination: driver.destination.clone(),
            assigned_vehicle_id: None,
            rating: driver.rating,
        };
        backend.drivers.push(created.clone());
        Ok(created)
    }

    async fn get_driver(&self, id: &str) -> AppResult<Driver> {
        let mut backend = self.enter(ops::GET_DRIVER).await?;
        backend.driver_mut(id).map(|d| d.clone())
    }

    async fn delete_driver(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::DELETE_DRIVER).await?;
        backend.drivers.retain(|d| d.id != id);
        Ok(())
    }

    async fn update_availability(&self, id: &str, available: bool) -> AppResult<()> {
        let mut backend = self.enter(ops::UPDATE_AVAILABILITY).await?;
        apply_availability(backend.driver_mut(id)?, available);
        Ok(())
    }

    async fn update_location(&self, id: &str, location: &str, destination: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::UPDATE_LOCATION).await?;
        let driver = backend.driver_mut(id)?;
        driver.location = Some(location.to_string());
        driver.destination = Some(destination.to_string());
        Ok(())
    }

    async fn update_driver_details(&self, id: &str, patch: &DriverPatch) -> AppResult<Driver> {
        let mut backend = self.enter(ops::UPDATE_DRIVER).await?;
        let driver = backend.driver_mut(id)?;
        if let Some(name) = &patch.name {
            driver.name = name.clone();
        }
        if let Some(license_class) = &patch.license_class {
            driver.license_class = license_class.clone();
        }
        if patch.rating.is_some() {
            driver.rating = patch.rating;
        }
        if patch.status.is_some() {
            driver.status = patch.status.clone();
        }
        if patch.location.is_some() {
            driver.location = patch.location.clone();
        }
        if patch.destination.is_some() {
            driver.destination = patch.destination.clone();
        }
        Ok(driver.clone())
    }

    async fn apply_leave(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::APPLY_LEAVE).await?;
        let driver = backend.driver_mut(id)?;
        driver.availability = false;
        driver.status = Some(DriverStatus::OnLeave);
        backend.set_vehicle_status_of_driver(id, VehicleStatus::Unavailable);
        Ok(())
    }

    async fn raise_emergency(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::RAISE_EMERGENCY).await?;
        let driver = backend.driver_mut(id)?;
        driver.availability = false;
        driver.status = Some(DriverStatus::Emergency);
        backend.set_vehicle_status_of_driver(id, VehicleStatus::Unavailable);
        Ok(())
    }

    async fn list_jobs(&self) -> AppResult<Vec<Job>> {
        let jobs = self.enter(ops::LIST_JOBS).await?.jobs.clone();
        self.simulate_latency(ops::LIST_JOBS).await;
        Ok(jobs)
    }

    async fn create_job(&self, job: &JobPatch) -> AppResult<Job> {
        let mut backend = self.enter(ops::CREATE_JOB).await?;

        if let Some(vehicle_id) = job.vehicle_id.as_deref() {
            if let Some(vehicle) = backend.vehicles.iter().find(|v| v.id == vehicle_id) {
                if !vehicle.is_dispatchable() {
                    return Err(conflict_error(&format!(
                        "Vehicle {} is not available (status {})",
                        vehicle_id, vehicle.status
                    )));
                }
            }
        }

        let created = Job {
            id: Uuid::new_v4().to_string(),
            pickup: job.pickup.clone().unwrap_or_default(),
            destination: job.destination.clone().unwrap_or_default(),
            status: job.status.clone().unwrap_or(JobStatus::Pending),
            vehicle_id: job.vehicle_id.clone(),
            driver_id: job.driver_id.clone(),
            stops: Vec::new(),
            created_at: Some(Utc::now()),
        };
        backend.jobs.push(created.clone());

        backend.set_vehicle_status(created.vehicle_id.as_deref(), VehicleStatus::InTransit);
        backend.set_driver_availability(created.driver_id.as_deref(), false);
        Ok(created)
    }

    async fn get_job(&self, id: &str) -> AppResult<Job> {
        let mut backend = self.enter(ops::GET_JOB).await?;
        backend.job_mut(id).map(|j| j.clone())
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> AppResult<Job> {
        let mut backend = self.enter(ops::UPDATE_JOB).await?;
        let job = backend.job_mut(id)?;
        if let Some(pickup) = &patch.pickup {
            job.pickup = pickup.clone();
        }
        if let Some(destination) = &patch.destination {
            job.destination = destination.clone();
        }
        if let Some(status) = &patch.status {
            job.status = status.clone();
        }
        Ok(job.clone())
    }

    async fn delete_job(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::DELETE_JOB).await?;
        backend.job_mut(id)?;
        backend.jobs.retain(|j| j.id != id);
        Ok(())
    }

    async fn mark_arrival(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::MARK_ARRIVAL).await?;
        let job = backend.job_mut(id)?;
        if job.status == JobStatus::Completed {
            return Ok(());
        }
        job.status = JobStatus::Completed;
        let (vehicle_id, driver_id) = (job.vehicle_id.clone(), job.driver_id.clone());

        backend.set_vehicle_status(vehicle_id.as_deref(), VehicleStatus::Available);
        backend.set_driver_availability(driver_id.as_deref(), true);
        Ok(())
    }

    async fn mark_stop(&self, id: &str, stop_name: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::MARK_STOP).await?;
        let job = backend.job_mut(id)?;
        if let Some(stop) = job.stops.iter_mut().find(|s| s.name == stop_name) {
            stop.reached_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn job_emergency(&self, id: &str) -> AppResult<()> {
        let mut backend = self.enter(ops::JOB_EMERGENCY).await?;
        let job = backend.job_mut(id)?;
        job.status = JobStatus::NeedsAttention;
        let vehicle_id = job.vehicle_id.clone();
        backend.set_vehicle_status(vehicle_id.as_deref(), VehicleStatus::Maintenance);
        Ok(())
    }
}
