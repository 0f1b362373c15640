//! Modelos del sistema
//!
//! Este módulo contiene los modelos que espejan los documentos de los
//! servicios de flota, conductores y despacho.

use serde::{Deserialize, Deserializer};

pub mod auth;
pub mod driver;
pub mod job;
pub mod vehicle;

pub use auth::{LoginRequest, LoginResponse, ProvisionDriverRequest, UserRole};
pub use driver::{Driver, DriverPatch, DriverStatus};
pub use job::{Job, JobPatch, JobStatus, JobStop};
pub use vehicle::{Vehicle, VehiclePatch, VehicleStatus};

/// Los servicios Java serializan campos vacíos como `null`
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
