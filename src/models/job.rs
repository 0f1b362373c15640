//! Modelo de Job (misión de despacho)

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::null_as_default;

/// Estado del job
///
/// El backend es el único que hace transiciones:
/// PENDING -> IN_PROGRESS -> COMPLETED, con NEEDS_ATTENTION y CANCELLED
/// alcanzables desde PENDING o IN_PROGRESS. El cliente solo las observa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    NeedsAttention,
    Cancelled,
    Unknown(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::NeedsAttention => "NEEDS_ATTENTION",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Unknown(raw) => raw,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => JobStatus::Pending,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "NEEDS_ATTENTION" => JobStatus::NeedsAttention,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Unknown(value.to_string()),
        }
    }

    /// PENDING o IN_PROGRESS: el job cuenta como misión activa del conductor
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::InProgress)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Pending
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        JobStatus::from_wire(&value)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Parada intermedia de un job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStop {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "flexible_datetime")]
    pub reached_at: Option<DateTime<Utc>>,
}

/// Job tal como lo devuelve el servicio de despacho
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pickup: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub destination: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    /// Snapshot del driver asignado al vehículo en el momento de crear el job.
    /// No se re-resuelve si luego se reasigna el vehículo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stops: Vec<JobStop>,
    #[serde(
        default,
        deserialize_with = "flexible_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_assigned_to(&self, driver_id: &str) -> bool {
        self.driver_id.as_deref() == Some(driver_id)
    }

    /// Prefijo corto del id para listados
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

/// Payload parcial para crear o actualizar un job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
}

/// Acepta RFC 3339 o el `LocalDateTime` de Java sin zona (se asume UTC)
///
/// Un formato desconocido se descarta (`None`) para no perder el listado entero.
fn flexible_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Ok(Some(naive.and_utc())),
        Err(e) => {
            log::warn!("⚠️ Fecha ilegible '{}' ignorada: {}", raw, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_from_spring_payload() {
        let job: Job = serde_json::from_value(json!({
            "id": "6650f1c2a9e4b23d1c0f9a77",
            "pickup": "Depot",
            "destination": "Lyon",
            "status": "IN_PROGRESS",
            "vehicleId": "v1",
            "driverId": "d1",
            "stops": [{ "name": "Dijon", "reachedAt": null }],
            "createdAt": "2025-08-18T10:15:30.123456"
        }))
        .unwrap();

        assert!(job.status.is_active());
        assert!(job.is_assigned_to("d1"));
        assert_eq!(job.stops.len(), 1);
        assert_eq!(job.short_id(), "6650f1c2");
        assert!(job.created_at.is_some());
    }

    #[test]
    fn test_job_with_rfc3339_and_missing_fields() {
        let job: Job = serde_json::from_value(json!({
            "id": "j1",
            "status": null,
            "stops": null,
            "createdAt": "2025-08-18T10:15:30Z"
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.stops.is_empty());
        assert_eq!(job.short_id(), "j1");
        assert_eq!(job.driver_id, None);
    }

    #[test]
    fn test_patch_serializes_camel_case() {
        let patch = JobPatch {
            pickup: Some("A".to_string()),
            destination: Some("B".to_string()),
            status: Some(JobStatus::Pending),
            vehicle_id: Some("v1".to_string()),
            driver_id: None,
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "pickup": "A", "destination": "B", "status": "PENDING", "vehicleId": "v1" })
        );
    }

    #[test]
    fn test_odd_record_does_not_break_the_list() {
        let jobs: Vec<Job> = serde_json::from_value(json!([
            { "id": "j1", "status": "PENDING", "createdAt": "2025-08-18T10:15:30" },
            {
                "id": "j2",
                "status": "IN_PROGRESS",
                "stops": [{ "name": null }, { "name": "Dijon", "reachedAt": "yesterday" }],
                "createdAt": "18/08/2025 10:15"
            }
        ]))
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].created_at.is_some());
        assert_eq!(jobs[1].created_at, None);
        assert_eq!(jobs[1].stops[0].name, "");
        assert_eq!(jobs[1].stops[1].reached_at, None);
    }
}
