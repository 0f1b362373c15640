//! Fleet Dispatch
//!
//! Cliente de la consola de logística: vistas de vehículos, conductores y
//! jobs sobre el gateway REST, con el flujo de despacho y asignación.

pub mod clients;
pub mod config;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use clients::{FleetGateway, HttpGateway, InMemoryGateway};
pub use services::DispatchCoordinator;
pub use state::{SessionContext, SessionEvent, SessionStore};
pub use utils::errors::{AppError, AppResult};
