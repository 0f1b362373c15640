//! Confirmación sí/no antes de las acciones destructivas

/// Gate de confirmación que la interfaz provee (prompt en consola, closure en tests)
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Prompts que ve el operador
pub mod prompts {
    pub const CANCEL_JOB: &str = "Cancel this mission?";
    pub const DELETE_JOB: &str = "Delete this mission permanently?";
    pub const DRIVER_EMERGENCY: &str = "REPORT EMERGENCY? This will alert HDQ.";
    pub const ADMIN_EMERGENCY: &str = "RAISE EMERGENCY?";
    pub const ADMIN_LEAVE: &str = "Mark as On Leave?";
    pub const DELETE_VEHICLE: &str = "Decommission this vehicle?";
    pub const DELETE_DRIVER: &str = "Terminate contract?";
}
