//! Clients - puerto hacia el gateway de la flota
//!
//! `FleetGateway` tiene un método por operación del gateway (auth, vehículos,
//! conductores, jobs). Hay dos adaptadores: `HttpGateway` (reqwest) y
//! `InMemoryGateway` (backend en memoria para tests y modo offline).

use async_trait::async_trait;

use crate::models::{
    Driver, DriverPatch, Job, JobPatch, LoginRequest, LoginResponse, ProvisionDriverRequest,
    Vehicle, VehiclePatch, VehicleStatus,
};
use crate::utils::errors::AppResult;

pub mod http_gateway;
pub mod memory_gateway;

pub use http_gateway::{GatewayUrls, HttpGateway};
pub use memory_gateway::{InMemoryGateway, InjectedFailure};

#[async_trait]
pub trait FleetGateway: Send + Sync {
    // Auth
    async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse>;
    async fn provision_driver(&self, request: &ProvisionDriverRequest) -> AppResult<()>;

    // Vehículos
    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>>;
    async fn create_vehicle(&self, vehicle: &VehiclePatch) -> AppResult<Vehicle>;
    async fn update_vehicle(&self, id: &str, patch: &VehiclePatch) -> AppResult<Vehicle>;
    async fn delete_vehicle(&self, id: &str) -> AppResult<()>;
    async fn available_vehicle_by_type(&self, vehicle_type: &str) -> AppResult<Vehicle>;
    async fn vehicle_by_plate(&self, plate: &str) -> AppResult<Vehicle>;
    async fn update_vehicle_status(&self, id: &str, status: &VehicleStatus) -> AppResult<()>;
    async fn assign_driver(&self, vehicle_id: &str, driver_id: &str) -> AppResult<Vehicle>;

    // Conductores
    async fn list_drivers(&self) -> AppResult<Vec<Driver>>;
    async fn create_driver(&self, driver: &DriverPatch) -> AppResult<Driver>;
    async fn get_driver(&self, id: &str) -> AppResult<Driver>;
    async fn delete_driver(&self, id: &str) -> AppResult<()>;
    async fn update_availability(&self, id: &str, available: bool) -> AppResult<()>;
    async fn update_location(&self, id: &str, location: &str, destination: &str) -> AppResult<()>;
    async fn update_driver_details(&self, id: &str, patch: &DriverPatch) -> AppResult<Driver>;
    async fn apply_leave(&self, id: &str) -> AppResult<()>;
    async fn raise_emergency(&self, id: &str) -> AppResult<()>;

    // Jobs
    async fn list_jobs(&self) -> AppResult<Vec<Job>>;
    async fn create_job(&self, job: &JobPatch) -> AppResult<Job>;
    async fn get_job(&self, id: &str) -> AppResult<Job>;
    async fn update_job(&self, id: &str, patch: &JobPatch) -> AppResult<Job>;
    async fn delete_job(&self, id: &str) -> AppResult<()>;
    async fn mark_arrival(&self, id: &str) -> AppResult<()>;
    async fn mark_stop(&self, id: &str, stop_name: &str) -> AppResult<()>;
    async fn job_emergency(&self, id: &str) -> AppResult<()>;
}
