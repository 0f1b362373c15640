//! Datos de prueba compartidos por los tests de integración

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use fleet_dispatch::clients::InMemoryGateway;
use fleet_dispatch::models::{Driver, DriverStatus, Job, JobStatus, Vehicle, VehicleStatus};
use fleet_dispatch::services::{Confirmation, DispatchCoordinator};
use fleet_dispatch::state::SessionStore;

pub fn vehicle(id: &str, status: VehicleStatus, driver: Option<&str>) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        plate: format!("PL-{}", id),
        vehicle_type: "Truck".to_string(),
        status,
        status_raw: None,
        last_location: Some("HQ".to_string()),
        assigned_driver_id: driver.map(str::to_string),
        health: Some("GOOD".to_string()),
    }
}

pub fn driver(id: &str, name: &str) -> Driver {
    Driver {
        id: id.to_string(),
        name: name.to_string(),
        license_class: "C".to_string(),
        availability: true,
        status: Some(DriverStatus::Available),
        location: Some("HQ".to_string()),
        destination: None,
        assigned_vehicle_id: None,
        rating: Some(4.5),
    }
}

pub fn job(id: &str, driver: &str, status: JobStatus) -> Job {
    Job {
        id: id.to_string(),
        pickup: "Depot".to_string(),
        destination: format!("Dest {}", id),
        status,
        vehicle_id: None,
        driver_id: Some(driver.to_string()),
        stops: Vec::new(),
        created_at: None,
    }
}

pub struct Fixture {
    pub session: SessionStore,
    pub gateway: Arc<InMemoryGateway>,
    pub coordinator: Arc<DispatchCoordinator>,
}

/// Backend con el vehículo v1 (AVAILABLE, asignado a d1) y la conductora d1
pub async fn fixture() -> Fixture {
    let session = SessionStore::new();
    let gateway = Arc::new(InMemoryGateway::new(session.clone()));
    gateway
        .seed_vehicle(vehicle("v1", VehicleStatus::Available, Some("d1")))
        .await;
    gateway.seed_driver(driver("d1", "Alice")).await;
    let coordinator = Arc::new(DispatchCoordinator::new(gateway.clone()));
    Fixture {
        session,
        gateway,
        coordinator,
    }
}

/// Confirmación que responde siempre lo mismo y guarda los prompts recibidos
pub struct ScriptedConfirmation {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn accept() -> Self {
        Self {
            answer: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn decline() -> Self {
        Self {
            answer: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirmation for ScriptedConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}
