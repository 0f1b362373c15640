//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del cliente: URLs del gateway,
//! intervalos de polling y modo del backend.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use crate::utils::errors::{AppError, AppResult};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:9000";

/// Backend contra el que trabaja la consola
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    Http,
    /// Backend en memoria, para trabajar sin servicios levantados
    Memory,
}

impl FromStr for GatewayMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(GatewayMode::Http),
            "memory" => Ok(GatewayMode::Memory),
            other => Err(AppError::Config(format!("GATEWAY_MODE inválido: {}", other))),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone, Validate)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub gateway_mode: GatewayMode,
    // URLs por servicio; por defecto todas apuntan al gateway
    #[validate(url)]
    pub fleet_base_url: String,
    #[validate(url)]
    pub driver_base_url: String,
    #[validate(url)]
    pub dispatch_base_url: String,
    #[validate(range(min = 500))]
    pub jobs_poll_interval_ms: u64,
    #[validate(range(min = 500))]
    pub vehicles_poll_interval_ms: u64,
    #[validate(range(min = 500))]
    pub drivers_poll_interval_ms: u64,
    #[validate(range(min = 500))]
    pub portal_poll_interval_ms: u64,
    /// Sin timeout a nivel de aplicación salvo que se configure
    pub request_timeout_secs: Option<u64>,
    pub log_level: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            gateway_mode: GatewayMode::Http,
            fleet_base_url: DEFAULT_GATEWAY_URL.to_string(),
            driver_base_url: DEFAULT_GATEWAY_URL.to_string(),
            dispatch_base_url: DEFAULT_GATEWAY_URL.to_string(),
            jobs_poll_interval_ms: 3000,
            vehicles_poll_interval_ms: 5000,
            drivers_poll_interval_ms: 5000,
            portal_poll_interval_ms: 5000,
            request_timeout_secs: None,
            log_level: "INFO".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración de las variables de entorno (y `.env` si existe)
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construir la configuración a partir de una función de lookup
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gateway = var("GATEWAY_BASE_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let gateway = gateway.trim_end_matches('/').to_string();
        let service_url = |key: &str| {
            var(key)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| gateway.clone())
        };

        let config = Self {
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            gateway_mode: match var("GATEWAY_MODE") {
                Some(mode) => mode.parse()?,
                None => defaults.gateway_mode,
            },
            fleet_base_url: service_url("FLEET_BASE_URL"),
            driver_base_url: service_url("DRIVER_BASE_URL"),
            dispatch_base_url: service_url("DISPATCH_BASE_URL"),
            jobs_poll_interval_ms: parse_number(&var, "JOBS_POLL_INTERVAL_MS", defaults.jobs_poll_interval_ms)?,
            vehicles_poll_interval_ms: parse_number(&var, "VEHICLES_POLL_INTERVAL_MS", defaults.vehicles_poll_interval_ms)?,
            drivers_poll_interval_ms: parse_number(&var, "DRIVERS_POLL_INTERVAL_MS", defaults.drivers_poll_interval_ms)?,
            portal_poll_interval_ms: parse_number(&var, "PORTAL_POLL_INTERVAL_MS", defaults.portal_poll_interval_ms)?,
            request_timeout_secs: match var("REQUEST_TIMEOUT_SECS") {
                Some(raw) => Some(raw.trim().parse().map_err(|_| {
                    AppError::Config(format!("REQUEST_TIMEOUT_SECS debe ser un número: {}", raw))
                })?),
                None => None,
            },
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn jobs_poll_interval(&self) -> Duration {
        Duration::from_millis(self.jobs_poll_interval_ms)
    }

    pub fn vehicles_poll_interval(&self) -> Duration {
        Duration::from_millis(self.vehicles_poll_interval_ms)
    }

    pub fn drivers_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drivers_poll_interval_ms)
    }

    pub fn portal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.portal_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_number<F>(var: &F, key: &str, default: u64) -> AppResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} debe ser un número: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_point_to_gateway() {
        let config = EnvironmentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.fleet_base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.dispatch_base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.jobs_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.drivers_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.gateway_mode, GatewayMode::Http);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_service_override_and_trailing_slash() {
        let config = EnvironmentConfig::from_lookup(lookup(&[
            ("GATEWAY_BASE_URL", "http://gateway:9000/"),
            ("DRIVER_BASE_URL", "http://drivers:8082/"),
            ("GATEWAY_MODE", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.fleet_base_url, "http://gateway:9000");
        assert_eq!(config.driver_base_url, "http://drivers:8082");
        assert_eq!(config.gateway_mode, GatewayMode::Memory);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = EnvironmentConfig::from_lookup(lookup(&[("JOBS_POLL_INTERVAL_MS", "fast")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = EnvironmentConfig::from_lookup(lookup(&[("JOBS_POLL_INTERVAL_MS", "10")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = EnvironmentConfig::from_lookup(lookup(&[("GATEWAY_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
