//! Health check de los servicios detrás del gateway

use futures::join;
use std::fmt;
use std::sync::Arc;

use crate::clients::FleetGateway;
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceHealth {
    Online { records: usize },
    Error(String),
}

impl ServiceHealth {
    fn from_listing<T>(result: AppResult<Vec<T>>) -> Self {
        match result {
            Ok(items) => ServiceHealth::Online {
                records: items.len(),
            },
            Err(e) => ServiceHealth::Error(e.alert()),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ServiceHealth::Online { .. })
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceHealth::Online { records } => write!(f, "Online ({} records)", records),
            ServiceHealth::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub fleet: ServiceHealth,
    pub driver: ServiceHealth,
    pub dispatch: ServiceHealth,
}

impl HealthReport {
    pub fn all_online(&self) -> bool {
        self.services().iter().all(|(_, health)| health.is_online())
    }

    pub fn services(&self) -> [(&'static str, &ServiceHealth); 3] {
        [
            ("Fleet Service", &self.fleet),
            ("Driver Service", &self.driver),
            ("Dispatch Service", &self.dispatch),
        ]
    }
}

pub struct HealthService {
    gateway: Arc<dyn FleetGateway>,
}

impl HealthService {
    pub fn new(gateway: Arc<dyn FleetGateway>) -> Self {
        Self { gateway }
    }

    /// Cada servicio se prueba por separado; una falla no afecta a los otros
    pub async fn probe(&self) -> HealthReport {
        let (vehicles, drivers, jobs) = join!(
            self.gateway.list_vehicles(),
            self.gateway.list_drivers(),
            self.gateway.list_jobs()
        );

        let report = HealthReport {
            fleet: ServiceHealth::from_listing(vehicles),
            driver: ServiceHealth::from_listing(drivers),
            dispatch: ServiceHealth::from_listing(jobs),
        };
        for (name, health) in report.services() {
            if health.is_online() {
                log::info!("✅ {}: {}", name, health);
            } else {
                log::warn!("⚠️ {}: {}", name, health);
            }
        }
        report
    }
}
