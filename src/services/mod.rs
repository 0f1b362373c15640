//! Services module
//!
//! Este módulo contiene la lógica del cliente: el coordinador de despacho y
//! los flujos que se apoyan en él (portal del conductor, administración,
//! polling y health check).

pub mod confirmation;
pub mod dispatch_coordinator;
pub mod driver_portal;
pub mod fleet_admin;
pub mod health_service;
pub mod poller;
pub mod versioned_collection;

pub use confirmation::Confirmation;
pub use dispatch_coordinator::{
    DispatchCandidate, DispatchCoordinator, FleetSummary, RefreshOutcome, RefreshReport,
};
pub use driver_portal::{DriverPortal, PortalState};
pub use fleet_admin::{CredentialSync, DriverForm, DriverRegistration, FleetAdmin, VehicleForm};
pub use health_service::{HealthReport, HealthService, ServiceHealth};
pub use poller::PollerHandle;
pub use versioned_collection::{ApplyOutcome, VersionedCollection};
