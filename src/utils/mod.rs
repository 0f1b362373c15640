//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores y lectura de JWT.

pub mod errors;
pub mod jwt;

pub use errors::{AppError, AppResult};
