//! Modelo de Driver
//!
//! El id del driver lo asigna el administrador y también es la contraseña
//! inicial del login del conductor.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::null_as_default;

/// Estado canónico del conductor
///
/// Mapeo desde el servicio de conductores:
/// `AVAILABLE | ACTIVE | ON_DUTY` -> `Available`, `BUSY` -> `Busy`,
/// `ON_LEAVE` -> `OnLeave`, `EMERGENCY` -> `Emergency`,
/// `OFFLINE | OFF_DUTY` -> `Offline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DriverStatus {
    Available,
    Busy,
    OnLeave,
    Emergency,
    Offline,
    Unknown(String),
}

impl DriverStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::Busy => "BUSY",
            DriverStatus::OnLeave => "ON_LEAVE",
            DriverStatus::Emergency => "EMERGENCY",
            DriverStatus::Offline => "OFFLINE",
            DriverStatus::Unknown(raw) => raw,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" | "ACTIVE" | "ON_DUTY" => DriverStatus::Available,
            "BUSY" => DriverStatus::Busy,
            "ON_LEAVE" => DriverStatus::OnLeave,
            "EMERGENCY" => DriverStatus::Emergency,
            "OFFLINE" | "OFF_DUTY" => DriverStatus::Offline,
            _ => DriverStatus::Unknown(value.to_string()),
        }
    }

    /// Etiqueta corta del portal del conductor
    pub fn label(&self) -> &str {
        match self {
            DriverStatus::Available => "Online",
            DriverStatus::Busy => "On Job",
            DriverStatus::OnLeave => "On Leave",
            DriverStatus::Emergency => "SOS",
            DriverStatus::Offline | DriverStatus::Unknown(_) => "Offline",
        }
    }
}

impl From<String> for DriverStatus {
    fn from(value: String) -> Self {
        DriverStatus::from_wire(&value)
    }
}

impl From<DriverStatus> for String {
    fn from(status: DriverStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Driver tal como lo devuelve el servicio de conductores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub license_class: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub availability: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(
        default,
        alias = "assignedVehicle",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_vehicle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Driver {
    /// Estado efectivo: el declarado, o derivado de `availability` si falta
    pub fn effective_status(&self) -> DriverStatus {
        match &self.status {
            Some(status) => status.clone(),
            None if self.availability => DriverStatus::Available,
            None => DriverStatus::Busy,
        }
    }

    /// Ubicación reportada; el backend a veces guarda el literal "null"
    pub fn reported_location(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|loc| !loc.trim().is_empty() && *loc != "null")
    }
}

/// Payload parcial para crear o actualizar un driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_vocabulary_mapping() {
        assert_eq!(DriverStatus::from_wire("ACTIVE"), DriverStatus::Available);
        assert_eq!(DriverStatus::from_wire("ON_DUTY"), DriverStatus::Available);
        assert_eq!(DriverStatus::from_wire("OFF_DUTY"), DriverStatus::Offline);
        assert_eq!(DriverStatus::from_wire("on_leave"), DriverStatus::OnLeave);
        assert_eq!(String::from(DriverStatus::Available), "AVAILABLE");
    }

    #[test]
    fn test_driver_from_gateway_json() {
        let driver: Driver = serde_json::from_value(json!({
            "id": "d1",
            "name": "Alice",
            "licenseClass": "C",
            "availability": null,
            "status": "ON_DUTY",
            "location": "null",
            "assignedVehicle": "v1",
            "rating": 4.5
        }))
        .unwrap();

        assert!(!driver.availability);
        assert_eq!(driver.effective_status(), DriverStatus::Available);
        assert_eq!(driver.reported_location(), None);
        assert_eq!(driver.assigned_vehicle_id.as_deref(), Some("v1"));
    }

    #[test]
    fn test_missing_status_derived_from_availability() {
        let mut driver: Driver =
            serde_json::from_value(json!({ "id": "d2", "name": "Bob", "availability": true }))
                .unwrap();
        assert_eq!(driver.effective_status(), DriverStatus::Available);

        driver.availability = false;
        assert_eq!(driver.effective_status(), DriverStatus::Busy);
    }
}
