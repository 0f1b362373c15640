//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle tal como lo devuelve el servicio de
//! flota, su estado canónico y el payload parcial para create/update.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::null_as_default;

/// Estado canónico del vehículo
///
/// El servicio de flota mezcla vocabularios (`BUSY` y `IN_TRANSIT` para lo
/// mismo, `EMERGENCY` cuando el conductor reporta una emergencia). Se decodifica
/// todo a este enum; los valores desconocidos se conservan en `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum VehicleStatus {
    Available,
    InTransit,
    Maintenance,
    Unavailable,
    Unknown(String),
}

impl VehicleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VehicleStatus::Available => "AVAILABLE",
            VehicleStatus::InTransit => "IN_TRANSIT",
            VehicleStatus::Maintenance => "MAINTENANCE",
            VehicleStatus::Unavailable => "UNAVAILABLE",
            VehicleStatus::Unknown(raw) => raw,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" => VehicleStatus::Available,
            "IN_TRANSIT" | "BUSY" => VehicleStatus::InTransit,
            "MAINTENANCE" => VehicleStatus::Maintenance,
            "UNAVAILABLE" | "EMERGENCY" => VehicleStatus::Unavailable,
            _ => VehicleStatus::Unknown(value.to_string()),
        }
    }

    /// Solo los vehículos AVAILABLE pueden recibir un job
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, VehicleStatus::Available)
    }
}

impl Default for VehicleStatus {
    fn default() -> Self {
        VehicleStatus::Unknown(String::new())
    }
}

impl From<Option<String>> for VehicleStatus {
    fn from(value: Option<String>) -> Self {
        value
            .map(|raw| VehicleStatus::from_wire(&raw))
            .unwrap_or_default()
    }
}

impl From<VehicleStatus> for String {
    fn from(status: VehicleStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Vehicle principal - mapea al documento del servicio de flota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "VehicleRecord")]
pub struct Vehicle {
    pub id: String,
    pub plate: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub status: VehicleStatus,
    /// Estado tal como lo guarda el servicio de flota (`EMERGENCY`, `BUSY`...)
    #[serde(skip)]
    pub status_raw: Option<String>,
    pub last_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

/// Documento de la flota tal cual llega por la red
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleRecord {
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    plate: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    vehicle_type: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_location: Option<String>,
    #[serde(default)]
    assigned_driver_id: Option<String>,
    #[serde(default)]
    health: Option<String>,
}

impl From<VehicleRecord> for Vehicle {
    fn from(record: VehicleRecord) -> Self {
        Self {
            id: record.id,
            plate: record.plate,
            vehicle_type: record.vehicle_type,
            status: VehicleStatus::from(record.status.clone()),
            status_raw: record.status,
            last_location: record.last_location,
            assigned_driver_id: record.assigned_driver_id,
            health: record.health,
        }
    }
}

impl Vehicle {
    pub fn is_dispatchable(&self) -> bool {
        self.status.is_dispatchable()
    }

    /// Driver asignado, ignorando strings vacíos que a veces envía el backend
    pub fn assigned_driver(&self) -> Option<&str> {
        self.assigned_driver_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Estado para reenviar en una actualización, sin normalizar
    ///
    /// `None` si el backend no tiene estado para este vehículo.
    pub fn wire_status(&self) -> Option<&str> {
        let raw = match &self.status_raw {
            Some(raw) => raw.as_str(),
            None => self.status.as_str(),
        };
        Some(raw.trim()).filter(|raw| !raw.is_empty())
    }

    /// Cambio de estado canónico (lo que hacen los servicios internamente)
    pub fn set_status(&mut self, status: VehicleStatus) {
        self.status_raw = Some(status.as_str().to_string());
        self.status = status;
    }

    /// Guardar un estado recibido como texto libre
    pub fn set_wire_status(&mut self, raw: &str) {
        self.status = VehicleStatus::from_wire(raw);
        self.status_raw = Some(raw.to_string());
    }
}

/// Payload parcial para crear o actualizar un vehículo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    /// Texto libre: el servicio de flota no restringe los valores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}
